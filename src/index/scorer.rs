use crate::store::Repository;
use anyhow::Result;
use tracing::{debug, warn};

/// Computes idf per term and tf / tf·idf per posting from the weighted
/// frequencies, then persists term stats and posting scores.
pub fn score_terms(store: &dyn Repository) -> Result<()> {
    let terms = store.list_terms_alpha()?;
    let counts = store.posting_counts()?;
    let doc_count = store.distinct_doc_count()?;

    for (done, term) in terms.iter().enumerate() {
        let Some(&df) = counts.get(term) else {
            continue;
        };
        if df == 0 {
            continue;
        }
        let idf = (doc_count as f64 / df as f64).log10();
        if let Err(err) = store.set_term_stats(term, idf, df) {
            warn!("set_term_stats {term}: {err}");
            continue;
        }

        for (path_id, weighted_freq) in store.weighted_freqs(term)? {
            let tf = log_tf(weighted_freq);
            if let Err(err) = store.set_posting_scores(term, &path_id, tf, tf * idf) {
                warn!("set_posting_scores {term}/{path_id}: {err}");
            }
        }
        debug!("scored term {term} ({}/{})", done + 1, terms.len());
    }
    Ok(())
}

/// Bigram counterpart of [`score_terms`], over the bigram index namespace.
pub fn score_bigrams(store: &dyn Repository) -> Result<()> {
    let bigrams = store.list_bigrams_alpha()?;
    let counts = store.bigram_posting_counts()?;
    let doc_count = store.distinct_bigram_doc_count()?;

    for (done, bigram) in bigrams.iter().enumerate() {
        let Some(&df) = counts.get(bigram) else {
            continue;
        };
        if df == 0 {
            continue;
        }
        let idf = (doc_count as f64 / df as f64).log10();
        if let Err(err) = store.set_bigram_stats(bigram, idf, df) {
            warn!("set_bigram_stats {bigram}: {err}");
            continue;
        }

        for (path_id, weighted_freq) in store.bigram_freqs(bigram)? {
            let tf = log_tf(weighted_freq);
            if let Err(err) = store.set_bigram_posting_scores(bigram, &path_id, tf, tf * idf) {
                warn!("set_bigram_posting_scores {bigram}/{path_id}: {err}");
            }
        }
        debug!("scored bigram {bigram} ({}/{})", done + 1, bigrams.len());
    }
    Ok(())
}

/// Logarithmic term frequency; zero stays zero rather than diverging.
fn log_tf(weighted_freq: u64) -> f64 {
    if weighted_freq > 0 {
        1.0 + (weighted_freq as f64).log10()
    } else {
        0.0
    }
}
