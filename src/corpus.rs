use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const BOOKKEEPING_FILE: &str = "bookkeeping.json";

/// A static corpus directory: `bookkeeping.json` mapping
/// `"<bucket>/<index>" -> url`, plus one raw HTML file per entry at that
/// relative path.
pub struct Corpus {
    root: PathBuf,
    /// `(path_id, url)` pairs sorted numerically by `(bucket, index)`.
    entries: Vec<(String, String)>,
}

impl Corpus {
    /// Loads and sorts the bookkeeping mapping. A missing or malformed
    /// bookkeeping file is fatal for any build step.
    pub fn load(root: &Path) -> Result<Corpus> {
        let bookkeeping = root.join(BOOKKEEPING_FILE);
        let raw = fs::read_to_string(&bookkeeping)
            .with_context(|| format!("reading {}", bookkeeping.display()))?;
        let mapping: HashMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", bookkeeping.display()))?;

        let mut entries: Vec<(String, String)> = mapping.into_iter().collect();
        entries.sort_by_key(|(path_id, _)| sort_key(path_id));

        Ok(Corpus {
            root: root.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn document_path(&self, path_id: &str) -> PathBuf {
        self.root.join(path_id)
    }

    /// Raw file size in bytes, if the document exists on disk.
    pub fn document_size(&self, path_id: &str) -> Option<u64> {
        fs::metadata(self.document_path(path_id)).ok().map(|m| m.len())
    }

    /// Reads a document as lossy UTF-8; non-decodable bytes are replaced
    /// rather than failing the document.
    pub fn read_document(&self, path_id: &str) -> std::io::Result<String> {
        let bytes = fs::read(self.document_path(path_id))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Bookkeeping keys look like `"65/278"`; iterate them in numeric order.
/// Malformed components sort last.
fn sort_key(path_id: &str) -> (u64, u64) {
    let mut parts = path_id.splitn(2, '/');
    let bucket = parts
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(u64::MAX);
    let index = parts
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(u64::MAX);
    (bucket, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_corpus(dir: &TempDir, bookkeeping: &str) {
        let mut file = fs::File::create(dir.path().join(BOOKKEEPING_FILE)).unwrap();
        file.write_all(bookkeeping.as_bytes()).unwrap();
    }

    #[test]
    fn test_entries_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        write_corpus(
            &dir,
            r#"{"10/2": "c.edu", "2/10": "b.edu", "2/9": "a.edu"}"#,
        );
        let corpus = Corpus::load(dir.path()).unwrap();
        let ids: Vec<&str> = corpus.entries().iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(ids, vec!["2/9", "2/10", "10/2"]);
    }

    #[test]
    fn test_missing_bookkeeping_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(Corpus::load(dir.path()).is_err());
    }

    #[test]
    fn test_read_document_lossy() {
        let dir = TempDir::new().unwrap();
        write_corpus(&dir, r#"{"0/0": "a.edu"}"#);
        fs::create_dir(dir.path().join("0")).unwrap();
        fs::write(dir.path().join("0/0"), [b'h', b'i', 0xff]).unwrap();
        let corpus = Corpus::load(dir.path()).unwrap();
        let text = corpus.read_document("0/0").unwrap();
        assert!(text.starts_with("hi"));
    }
}
