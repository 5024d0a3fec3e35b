mod memory;
mod sqlite;

pub use memory::MemoryRepository;
pub use sqlite::SqliteRepository;

use crate::models::{
    BigramInsert, BigramScore, DocLengthRow, DocumentRecord, PostingInsert, PostingScore,
    TermStats,
};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("stored value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence boundary for the indexing pipeline and the query engine.
/// Documents, the unigram index, and the bigram index live in disjoint key
/// spaces; a document may appear in zero, one, or both indexes.
pub trait Repository: Send + Sync {
    // Write side: documents.
    fn put_document(&self, path_id: &str, url: &str) -> StoreResult<()>;
    fn set_title_snippet(&self, path_id: &str, title: &str, snippet: &str) -> StoreResult<()>;
    fn set_authority(&self, url: &str, score: f64) -> StoreResult<()>;

    // Write side: postings.
    fn upsert_unigram_posting(&self, path_id: &str, posting: &PostingInsert) -> StoreResult<()>;
    fn upsert_bigram_posting(&self, path_id: &str, posting: &BigramInsert) -> StoreResult<()>;

    // Write side: scores.
    fn set_term_stats(&self, term: &str, idf: f64, postings_count: usize) -> StoreResult<()>;
    fn set_posting_scores(&self, term: &str, path_id: &str, tf: f64, tf_idf: f64)
        -> StoreResult<()>;
    fn set_bigram_stats(&self, bigram: &str, idf: f64, postings_count: usize) -> StoreResult<()>;
    fn set_bigram_posting_scores(
        &self,
        bigram: &str,
        path_id: &str,
        tf: f64,
        tf_idf: f64,
    ) -> StoreResult<()>;

    // Read side: scoring pass.
    fn list_terms_alpha(&self) -> StoreResult<Vec<String>>;
    fn list_bigrams_alpha(&self) -> StoreResult<Vec<String>>;
    fn distinct_doc_count(&self) -> StoreResult<usize>;
    fn distinct_bigram_doc_count(&self) -> StoreResult<usize>;
    fn posting_counts(&self) -> StoreResult<HashMap<String, usize>>;
    fn bigram_posting_counts(&self) -> StoreResult<HashMap<String, usize>>;
    fn weighted_freqs(&self, term: &str) -> StoreResult<Vec<(String, u64)>>;
    fn bigram_freqs(&self, bigram: &str) -> StoreResult<Vec<(String, u64)>>;

    // Read side: query engine.
    fn term_stats(&self) -> StoreResult<HashMap<String, TermStats>>;
    fn term_postings(&self, term: &str) -> StoreResult<HashMap<String, PostingScore>>;
    fn bigram_postings(&self, bigram: &str) -> StoreResult<HashMap<String, BigramScore>>;
    /// For every document containing at least one of `terms`: the number of
    /// distinct query terms that hit it, their summed tf·idf, and the vector
    /// length, sorted by `(doc_count desc, sum_tfidf desc, path_id asc)`.
    fn documents_with_any(&self, terms: &[String]) -> StoreResult<Vec<DocLengthRow>>;
    fn all_documents(&self) -> StoreResult<HashMap<String, DocumentRecord>>;
}
