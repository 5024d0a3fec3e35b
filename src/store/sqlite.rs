use super::{Repository, StoreResult};
use crate::models::{
    BigramInsert, BigramScore, DocLengthRow, DocumentRecord, PostingInsert, PostingScore,
    TermStats,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::HashMap;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    path_id   TEXT PRIMARY KEY,
    url       TEXT NOT NULL,
    title     TEXT,
    snippet   TEXT,
    authority REAL
);
CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url);

CREATE TABLE IF NOT EXISTS terms (
    term           TEXT PRIMARY KEY,
    idf            REAL,
    postings_count INTEGER
);
CREATE TABLE IF NOT EXISTS postings (
    term           TEXT NOT NULL,
    path_id        TEXT NOT NULL,
    natural_freq   INTEGER NOT NULL,
    weighted_freq  INTEGER NOT NULL,
    positional_idx TEXT NOT NULL,
    tf             REAL,
    tf_idf         REAL,
    PRIMARY KEY (term, path_id)
);

CREATE TABLE IF NOT EXISTS bigrams (
    bigram         TEXT PRIMARY KEY,
    idf            REAL,
    postings_count INTEGER
);
CREATE TABLE IF NOT EXISTS bigram_postings (
    bigram        TEXT NOT NULL,
    path_id       TEXT NOT NULL,
    weighted_freq INTEGER NOT NULL,
    tf            REAL,
    tf_idf        REAL,
    PRIMARY KEY (bigram, path_id)
);
";

/// Pooled SQLite backend. Postings are flat `(term, path_id)` rows keyed for
/// range scans by term; positional indexes are stored as JSON arrays.
pub struct SqliteRepository {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteRepository {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::new(manager)?;
        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteRepository { pool })
    }

    /// Drops all indexed data; rebuilds start from a clean slate.
    pub fn wipe(&self) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "DELETE FROM documents; DELETE FROM terms; DELETE FROM postings;
             DELETE FROM bigrams; DELETE FROM bigram_postings;",
        )?;
        Ok(())
    }
}

impl Repository for SqliteRepository {
    fn put_document(&self, path_id: &str, url: &str) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO documents (path_id, url) VALUES (?1, ?2)
             ON CONFLICT(path_id) DO UPDATE SET url = excluded.url",
            params![path_id, url],
        )?;
        Ok(())
    }

    fn set_title_snippet(&self, path_id: &str, title: &str, snippet: &str) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE documents SET title = ?2, snippet = ?3 WHERE path_id = ?1",
            params![path_id, title, snippet],
        )?;
        Ok(())
    }

    fn set_authority(&self, url: &str, score: f64) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE documents SET authority = ?2 WHERE url = ?1",
            params![url, score],
        )?;
        Ok(())
    }

    fn upsert_unigram_posting(&self, path_id: &str, posting: &PostingInsert) -> StoreResult<()> {
        let conn = self.pool.get()?;
        let positions = serde_json::to_string(&posting.positional_idx)?;
        conn.execute(
            "INSERT INTO postings (term, path_id, natural_freq, weighted_freq, positional_idx)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(term, path_id) DO UPDATE SET
                 natural_freq = excluded.natural_freq,
                 weighted_freq = excluded.weighted_freq,
                 positional_idx = excluded.positional_idx",
            params![
                posting.term,
                path_id,
                posting.natural_freq as i64,
                posting.weighted_freq as i64,
                positions
            ],
        )?;
        Ok(())
    }

    fn upsert_bigram_posting(&self, path_id: &str, posting: &BigramInsert) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO bigram_postings (bigram, path_id, weighted_freq)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(bigram, path_id) DO UPDATE SET
                 weighted_freq = excluded.weighted_freq",
            params![posting.bigram, path_id, posting.weighted_freq as i64],
        )?;
        Ok(())
    }

    fn set_term_stats(&self, term: &str, idf: f64, postings_count: usize) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO terms (term, idf, postings_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(term) DO UPDATE SET
                 idf = excluded.idf, postings_count = excluded.postings_count",
            params![term, idf, postings_count as i64],
        )?;
        Ok(())
    }

    fn set_posting_scores(
        &self,
        term: &str,
        path_id: &str,
        tf: f64,
        tf_idf: f64,
    ) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE postings SET tf = ?3, tf_idf = ?4 WHERE term = ?1 AND path_id = ?2",
            params![term, path_id, tf, tf_idf],
        )?;
        Ok(())
    }

    fn set_bigram_stats(&self, bigram: &str, idf: f64, postings_count: usize) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO bigrams (bigram, idf, postings_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(bigram) DO UPDATE SET
                 idf = excluded.idf, postings_count = excluded.postings_count",
            params![bigram, idf, postings_count as i64],
        )?;
        Ok(())
    }

    fn set_bigram_posting_scores(
        &self,
        bigram: &str,
        path_id: &str,
        tf: f64,
        tf_idf: f64,
    ) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE bigram_postings SET tf = ?3, tf_idf = ?4 WHERE bigram = ?1 AND path_id = ?2",
            params![bigram, path_id, tf, tf_idf],
        )?;
        Ok(())
    }

    fn list_terms_alpha(&self) -> StoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT DISTINCT term FROM postings ORDER BY term ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn list_bigrams_alpha(&self) -> StoreResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT bigram FROM bigram_postings ORDER BY bigram ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn distinct_doc_count(&self) -> StoreResult<usize> {
        let conn = self.pool.get()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT path_id) FROM postings", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }

    fn distinct_bigram_doc_count(&self) -> StoreResult<usize> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT path_id) FROM bigram_postings",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn posting_counts(&self) -> StoreResult<HashMap<String, usize>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT term, COUNT(*) FROM postings GROUP BY term")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut counts = HashMap::new();
        for row in rows {
            let (term, count) = row?;
            counts.insert(term, count as usize);
        }
        Ok(counts)
    }

    fn bigram_posting_counts(&self) -> StoreResult<HashMap<String, usize>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT bigram, COUNT(*) FROM bigram_postings GROUP BY bigram")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut counts = HashMap::new();
        for row in rows {
            let (bigram, count) = row?;
            counts.insert(bigram, count as usize);
        }
        Ok(counts)
    }

    fn weighted_freqs(&self, term: &str) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT path_id, weighted_freq FROM postings WHERE term = ?1 ORDER BY path_id",
        )?;
        let rows = stmt.query_map(params![term], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn bigram_freqs(&self, bigram: &str) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT path_id, weighted_freq FROM bigram_postings WHERE bigram = ?1 ORDER BY path_id",
        )?;
        let rows = stmt.query_map(params![bigram], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn term_stats(&self) -> StoreResult<HashMap<String, TermStats>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT term, idf, postings_count FROM terms")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                TermStats {
                    idf: row.get(1)?,
                    postings_count: row.get::<_, i64>(2)? as usize,
                },
            ))
        })?;
        let mut stats = HashMap::new();
        for row in rows {
            let (term, stat) = row?;
            stats.insert(term, stat);
        }
        Ok(stats)
    }

    fn term_postings(&self, term: &str) -> StoreResult<HashMap<String, PostingScore>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT path_id, tf, tf_idf, positional_idx FROM postings WHERE term = ?1",
        )?;
        let rows = stmt.query_map(params![term], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut postings = HashMap::new();
        for row in rows {
            let (path_id, tf, tf_idf, positions) = row?;
            postings.insert(
                path_id,
                PostingScore {
                    tf: tf.unwrap_or(0.0),
                    tf_idf: tf_idf.unwrap_or(0.0),
                    positional_idx: serde_json::from_str(&positions)?,
                },
            );
        }
        Ok(postings)
    }

    fn bigram_postings(&self, bigram: &str) -> StoreResult<HashMap<String, BigramScore>> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT path_id, tf, tf_idf FROM bigram_postings WHERE bigram = ?1")?;
        let rows = stmt.query_map(params![bigram], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;
        let mut postings = HashMap::new();
        for row in rows {
            let (path_id, tf, tf_idf) = row?;
            postings.insert(
                path_id,
                BigramScore {
                    tf: tf.unwrap_or(0.0),
                    tf_idf: tf_idf.unwrap_or(0.0),
                },
            );
        }
        Ok(postings)
    }

    fn documents_with_any(&self, terms: &[String]) -> StoreResult<Vec<DocLengthRow>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let placeholders = vec!["?"; terms.len()].join(", ");
        let sql = format!(
            "SELECT path_id, COUNT(*), SUM(tf_idf), SUM(tf_idf * tf_idf)
             FROM postings WHERE term IN ({placeholders})
             GROUP BY path_id
             ORDER BY COUNT(*) DESC, SUM(tf_idf) DESC, path_id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(terms.iter()), |row| {
            Ok(DocLengthRow {
                path_id: row.get(0)?,
                doc_count: row.get::<_, i64>(1)? as usize,
                sum_tfidf: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                len: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0).sqrt(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn all_documents(&self) -> StoreResult<HashMap<String, DocumentRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT path_id, url, title, snippet, authority FROM documents")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                DocumentRecord {
                    url: row.get(1)?,
                    title: row.get(2)?,
                    snippet: row.get(3)?,
                    authority: row.get(4)?,
                },
            ))
        })?;
        let mut docs = HashMap::new();
        for row in rows {
            let (path_id, record) = row?;
            docs.insert(path_id, record);
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, SqliteRepository) {
        let dir = TempDir::new().unwrap();
        let repo = SqliteRepository::open(&dir.path().join("index.db")).unwrap();
        (dir, repo)
    }

    fn posting(term: &str, natural: u64, weighted: u64) -> PostingInsert {
        PostingInsert {
            term: term.to_string(),
            natural_freq: natural,
            positional_idx: (0..natural as usize).map(|i| i * 7).collect(),
            weighted_freq: weighted,
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let (_dir, repo) = repo();
        repo.put_document("0/0", "a.edu").unwrap();
        repo.set_title_snippet("0/0", "Title", "Snippet").unwrap();
        repo.set_authority("a.edu", 0.25).unwrap();

        let docs = repo.all_documents().unwrap();
        let doc = docs.get("0/0").unwrap();
        assert_eq!(doc.url, "a.edu");
        assert_eq!(doc.title.as_deref(), Some("Title"));
        assert_eq!(doc.snippet.as_deref(), Some("Snippet"));
        assert_eq!(doc.authority, Some(0.25));
    }

    #[test]
    fn test_posting_roundtrip_and_scores() {
        let (_dir, repo) = repo();
        repo.upsert_unigram_posting("0/0", &posting("apple", 2, 8)).unwrap();
        repo.upsert_unigram_posting("0/1", &posting("apple", 1, 1)).unwrap();
        repo.set_term_stats("apple", 0.3, 2).unwrap();
        repo.set_posting_scores("apple", "0/0", 1.9, 0.57).unwrap();

        assert_eq!(repo.list_terms_alpha().unwrap(), vec!["apple"]);
        assert_eq!(repo.distinct_doc_count().unwrap(), 2);
        assert_eq!(repo.posting_counts().unwrap().get("apple"), Some(&2));

        let weighted = repo.weighted_freqs("apple").unwrap();
        assert_eq!(weighted, vec![("0/0".to_string(), 8), ("0/1".to_string(), 1)]);

        let postings = repo.term_postings("apple").unwrap();
        let scored = postings.get("0/0").unwrap();
        assert_eq!(scored.tf, 1.9);
        assert_eq!(scored.tf_idf, 0.57);
        assert_eq!(scored.positional_idx, vec![0, 7]);

        let stats = repo.term_stats().unwrap();
        assert_eq!(stats.get("apple").unwrap().postings_count, 2);
    }

    #[test]
    fn test_bigram_roundtrip() {
        let (_dir, repo) = repo();
        repo.upsert_bigram_posting(
            "0/0",
            &BigramInsert {
                bigram: "machinelearning".to_string(),
                weighted_freq: 7,
            },
        )
        .unwrap();
        repo.set_bigram_stats("machinelearning", 0.0, 1).unwrap();
        repo.set_bigram_posting_scores("machinelearning", "0/0", 1.8, 0.0)
            .unwrap();

        assert_eq!(repo.list_bigrams_alpha().unwrap(), vec!["machinelearning"]);
        assert_eq!(repo.distinct_bigram_doc_count().unwrap(), 1);
        assert_eq!(
            repo.bigram_freqs("machinelearning").unwrap(),
            vec![("0/0".to_string(), 7)]
        );
        let postings = repo.bigram_postings("machinelearning").unwrap();
        assert_eq!(postings.get("0/0").unwrap().tf, 1.8);
    }

    #[test]
    fn test_documents_with_any_grouping() {
        let (_dir, repo) = repo();
        repo.upsert_unigram_posting("0/0", &posting("apple", 1, 1)).unwrap();
        repo.upsert_unigram_posting("0/0", &posting("banana", 1, 1)).unwrap();
        repo.upsert_unigram_posting("0/1", &posting("apple", 1, 1)).unwrap();
        repo.set_posting_scores("apple", "0/0", 1.0, 3.0).unwrap();
        repo.set_posting_scores("banana", "0/0", 1.0, 4.0).unwrap();
        repo.set_posting_scores("apple", "0/1", 1.0, 3.0).unwrap();

        let rows = repo
            .documents_with_any(&["apple".to_string(), "banana".to_string()])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].path_id, "0/0");
        assert_eq!(rows[0].doc_count, 2);
        assert_eq!(rows[0].sum_tfidf, 7.0);
        assert!((rows[0].len - 5.0).abs() < 1e-9);
        assert_eq!(rows[1].path_id, "0/1");
        assert_eq!(rows[1].doc_count, 1);

        assert!(repo.documents_with_any(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_wipe_clears_everything() {
        let (_dir, repo) = repo();
        repo.put_document("0/0", "a.edu").unwrap();
        repo.upsert_unigram_posting("0/0", &posting("apple", 1, 1)).unwrap();
        repo.wipe().unwrap();
        assert!(repo.all_documents().unwrap().is_empty());
        assert_eq!(repo.distinct_doc_count().unwrap(), 0);
    }
}
