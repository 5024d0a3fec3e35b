use serde::{Deserialize, Serialize};

/// One unigram posting produced by the index builder for a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingInsert {
    pub term: String,
    /// Occurrences across the title+body token stream.
    pub natural_freq: u64,
    /// Character offsets of each occurrence, body shifted past the title.
    pub positional_idx: Vec<usize>,
    /// Field-weighted occurrence count.
    pub weighted_freq: u64,
}

/// One bigram posting for a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct BigramInsert {
    pub bigram: String,
    pub weighted_freq: u64,
}

/// Scored posting row as served to the query engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingScore {
    pub tf: f64,
    pub tf_idf: f64,
    pub positional_idx: Vec<usize>,
}

/// Scored bigram posting row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BigramScore {
    pub tf: f64,
    pub tf_idf: f64,
}

/// Per-term statistics persisted by the scorer and preloaded by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStats {
    pub idf: f64,
    pub postings_count: usize,
}

/// Grouped row from the `documents_with_any` aggregate: for one candidate
/// document, how many query terms hit it, their summed tf·idf, and the
/// document vector length over the query terms.
#[derive(Debug, Clone, PartialEq)]
pub struct DocLengthRow {
    pub path_id: String,
    pub doc_count: usize,
    pub sum_tfidf: f64,
    pub len: f64,
}

/// Document record as preloaded at query time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentRecord {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub authority: Option<f64>,
}

/// One page entry in the HTTP/CLI result listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Full response for one query+page request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<PageResult>,
    pub number_results_found: usize,
    pub query_speed: f64,
    pub search_lemmatized: Vec<String>,
}
