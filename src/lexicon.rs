use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Static set of common English stop words, used when no stopword file is
/// supplied or the supplied file cannot be read.
static DEFAULT_STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    vec![
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can't", "cannot", "could", "couldn't", "did", "didn't",
        "do", "does", "doesn't", "doing", "don't", "down", "during", "each", "few", "for",
        "from", "further", "had", "hadn't", "has", "hasn't", "have", "haven't", "having", "he",
        "he'd", "he'll", "he's", "her", "here", "here's", "hers", "herself", "him", "himself",
        "his", "how", "how's", "i", "i'd", "i'll", "i'm", "i've", "if", "in", "into", "is",
        "isn't", "it", "it's", "its", "itself", "let's", "me", "more", "most", "mustn't", "my",
        "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other", "ought",
        "our", "ours", "ourselves", "out", "over", "own", "same", "shan't", "she", "she'd",
        "she'll", "she's", "should", "shouldn't", "so", "some", "such", "than", "that",
        "that's", "the", "their", "theirs", "them", "themselves", "then", "there", "there's",
        "these", "they", "they'd", "they'll", "they're", "they've", "this", "those", "through",
        "to", "too", "under", "until", "up", "very", "was", "wasn't", "we", "we'd", "we'll",
        "we're", "we've", "were", "weren't", "what", "what's", "when", "when's", "where",
        "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with", "won't",
        "would", "wouldn't", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
        "yourself", "yourselves",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

/// Irregular noun forms checked before the suffix rules.
static NOUN_EXCEPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("men", "man"),
        ("women", "woman"),
        ("children", "child"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("geese", "goose"),
        ("mice", "mouse"),
        ("lice", "louse"),
        ("oxen", "ox"),
        ("data", "datum"),
        ("criteria", "criterion"),
        ("phenomena", "phenomenon"),
        ("indices", "index"),
        ("matrices", "matrix"),
        ("vertices", "vertex"),
        ("appendices", "appendix"),
        ("analyses", "analysis"),
        ("theses", "thesis"),
        ("crises", "crisis"),
        ("hypotheses", "hypothesis"),
        ("lives", "life"),
        ("wives", "wife"),
        ("knives", "knife"),
        ("leaves", "leaf"),
        ("halves", "half"),
        ("shelves", "shelf"),
        ("wolves", "wolf"),
    ])
});

/// Suffix detachment rules in match priority order. The bare "s" rule runs
/// last and is guarded against "ss"/"us"/"is" endings.
const NOUN_SUFFIX_RULES: &[(&str, &str)] = &[
    ("ches", "ch"),
    ("shes", "sh"),
    ("sses", "ss"),
    ("xes", "x"),
    ("zes", "z"),
    ("ies", "y"),
    ("ves", "f"),
    ("s", ""),
];

/// Dictionary-style English lemmatization: irregular table first, then the
/// WordNet noun detachment rules. Deterministic; the input is expected to be
/// lowercase already.
pub fn lemmatize(word: &str) -> String {
    if let Some(lemma) = NOUN_EXCEPTIONS.get(word) {
        return (*lemma).to_string();
    }

    for (suffix, replacement) in NOUN_SUFFIX_RULES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if *suffix == "s" && (word.ends_with("ss") || word.ends_with("us") || word.ends_with("is")) {
                continue;
            }
            // Keep very short stems intact ("as", "is", ...)
            if stem.len() < 2 {
                continue;
            }
            return format!("{stem}{replacement}");
        }
    }

    word.to_string()
}

/// Forces the lemmatization tables into memory so the first query does not
/// pay the initialization cost.
pub fn preload() {
    lemmatize("preloading");
}

/// Immutable stopword set plus the token acceptance rule shared by the
/// indexing and query paths.
pub struct Lexicon {
    stop_words: HashSet<String>,
}

impl Lexicon {
    /// Loads the stopword set from a plain-text file, one word per line.
    /// Falls back to the embedded default list when the file is absent.
    pub fn load(stopwords_path: Option<&Path>) -> Self {
        let stop_words = match stopwords_path {
            Some(path) => match fs::read_to_string(path) {
                Ok(contents) => contents
                    .lines()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .collect(),
                Err(err) => {
                    warn!("stopword file {} not readable ({err}), using defaults", path.display());
                    DEFAULT_STOP_WORDS.clone()
                }
            },
            None => DEFAULT_STOP_WORDS.clone(),
        };
        Lexicon { stop_words }
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// A token survives when it is pure ASCII alphanumeric, between 4 and 69
    /// characters long, and not a stopword.
    pub fn accept_token(&self, word: &str) -> bool {
        !word.is_empty()
            && word.chars().all(|c| c.is_ascii_alphanumeric())
            && word.len() >= 4
            && word.len() <= 69
            && !self.is_stopword(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lemmatize_plurals() {
        assert_eq!(lemmatize("apples"), "apple");
        assert_eq!(lemmatize("churches"), "church");
        assert_eq!(lemmatize("studies"), "study");
        assert_eq!(lemmatize("wolves"), "wolf");
        assert_eq!(lemmatize("children"), "child");
    }

    #[test]
    fn test_lemmatize_keeps_non_plurals() {
        assert_eq!(lemmatize("hello"), "hello");
        assert_eq!(lemmatize("world"), "world");
        assert_eq!(lemmatize("machine"), "machine");
        assert_eq!(lemmatize("learning"), "learning");
        // "ss", "us" and "is" endings are not stripped
        assert_eq!(lemmatize("glass"), "glass");
        assert_eq!(lemmatize("campus"), "campus");
        assert_eq!(lemmatize("basis"), "basis");
    }

    #[test]
    fn test_accept_token() {
        let lexicon = Lexicon::load(None);
        assert!(lexicon.accept_token("hello"));
        assert!(lexicon.accept_token("a1b2"));
        // too short
        assert!(!lexicon.accept_token("abc"));
        // too long
        assert!(!lexicon.accept_token(&"x".repeat(70)));
        assert!(lexicon.accept_token(&"x".repeat(69)));
        // stopword
        assert!(!lexicon.accept_token("about"));
        // non-ascii and non-alphanumeric
        assert!(!lexicon.accept_token("café"));
        assert!(!lexicon.accept_token("foo_bar"));
        assert!(!lexicon.accept_token(""));
    }

    #[test]
    fn test_stopword_file_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "zebra\n  giraffe  \n").unwrap();
        let lexicon = Lexicon::load(Some(file.path()));
        assert!(lexicon.is_stopword("zebra"));
        assert!(lexicon.is_stopword("giraffe"));
        // default list is replaced, not merged
        assert!(!lexicon.is_stopword("about"));
    }

    #[test]
    fn test_missing_stopword_file_falls_back() {
        let lexicon = Lexicon::load(Some(Path::new("/nonexistent/stopwords.txt")));
        assert!(lexicon.is_stopword("about"));
    }
}
