mod builder;
mod scorer;

pub use builder::IndexBuilder;
pub use scorer::{score_bigrams, score_terms};

use crate::corpus::Corpus;
use crate::lexicon::Lexicon;
use crate::store::Repository;
use anyhow::Result;
use tracing::info;

/// Whole-corpus batch build: documents first, then per-document postings,
/// then the unigram and bigram scoring passes. Authority runs separately
/// once the index exists.
pub fn build_index(corpus: &Corpus, lexicon: &Lexicon, store: &dyn Repository) -> Result<()> {
    let builder = IndexBuilder::new(corpus, lexicon, store);
    builder.build()?;

    info!("scoring unigram index");
    score_terms(store)?;
    info!("scoring bigram index");
    score_bigrams(store)?;
    Ok(())
}
