//! # Quarry
//!
//! Quarry is a small offline search engine over a static corpus of HTML
//! documents identified by numeric path ids.
//!
//! The build pipeline analyzes dirty HTML into weighted textual fields,
//! produces a positional inverted index of terms and adjacent-term bigrams,
//! scores every posting with logarithmic TF·IDF, and computes a damped
//! link-graph authority score per document. The query engine lemmatizes
//! free-text queries, blends cosine similarity with a bigram bonus and the
//! authority score, and serves paginated results with cached titles and
//! snippets.
//!
//! ## Example
//!
//! ```no_run
//! use quarry::corpus::Corpus;
//! use quarry::engine::SearchEngine;
//! use quarry::lexicon::Lexicon;
//! use quarry::store::SqliteRepository;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let corpus = Corpus::load(Path::new("WEBPAGES_RAW"))?;
//! let store = SqliteRepository::open(Path::new("index.db"))?;
//! let lexicon = Lexicon::load(None);
//!
//! quarry::index::build_index(&corpus, &lexicon, &store)?;
//! quarry::authority::compute_authority(&corpus, &store)?;
//!
//! let engine = SearchEngine::new(Arc::new(store), Lexicon::load(None))?;
//! let page = engine.search("machine learning", 0);
//! println!("{} results", page.number_results_found);
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod authority;
pub mod corpus;
pub mod engine;
pub mod index;
pub mod lexicon;
pub mod models;
pub mod server;
pub mod store;
pub mod tokenize;

// Re-export commonly used types for convenience
pub use engine::SearchEngine;
pub use models::{PageResult, SearchResponse};
pub use store::{MemoryRepository, Repository, SqliteRepository};
