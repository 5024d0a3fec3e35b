use super::{Repository, StoreResult};
use crate::models::{
    BigramInsert, BigramScore, DocLengthRow, DocumentRecord, PostingInsert, PostingScore,
    TermStats,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct StoredPosting {
    natural_freq: u64,
    weighted_freq: u64,
    positional_idx: Vec<usize>,
    tf: f64,
    tf_idf: f64,
}

#[derive(Debug, Clone, Default)]
struct StoredBigram {
    weighted_freq: u64,
    tf: f64,
    tf_idf: f64,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, DocumentRecord>,
    url_index: HashMap<String, Vec<String>>,
    terms: HashMap<String, TermStats>,
    postings: BTreeMap<String, HashMap<String, StoredPosting>>,
    bigrams: HashMap<String, TermStats>,
    bigram_postings: BTreeMap<String, HashMap<String, StoredBigram>>,
}

/// In-memory implementation of the repository, used by tests and workable
/// for small corpora. Both index maps are ordered by key so the alphabetical
/// listings fall out of iteration.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn put_document(&self, path_id: &str, url: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let record = inner.documents.entry(path_id.to_string()).or_default();
        record.url = url.to_string();
        inner
            .url_index
            .entry(url.to_string())
            .or_default()
            .push(path_id.to_string());
        Ok(())
    }

    fn set_title_snippet(&self, path_id: &str, title: &str, snippet: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(record) = inner.documents.get_mut(path_id) {
            record.title = Some(title.to_string());
            record.snippet = Some(snippet.to_string());
        }
        Ok(())
    }

    fn set_authority(&self, url: &str, score: f64) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let path_ids = inner.url_index.get(url).cloned().unwrap_or_default();
        for path_id in path_ids {
            if let Some(record) = inner.documents.get_mut(&path_id) {
                record.authority = Some(score);
            }
        }
        Ok(())
    }

    fn upsert_unigram_posting(&self, path_id: &str, posting: &PostingInsert) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .postings
            .entry(posting.term.clone())
            .or_default()
            .entry(path_id.to_string())
            .or_default();
        entry.natural_freq = posting.natural_freq;
        entry.weighted_freq = posting.weighted_freq;
        entry.positional_idx = posting.positional_idx.clone();
        Ok(())
    }

    fn upsert_bigram_posting(&self, path_id: &str, posting: &BigramInsert) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .bigram_postings
            .entry(posting.bigram.clone())
            .or_default()
            .entry(path_id.to_string())
            .or_default();
        entry.weighted_freq = posting.weighted_freq;
        Ok(())
    }

    fn set_term_stats(&self, term: &str, idf: f64, postings_count: usize) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .terms
            .insert(term.to_string(), TermStats { idf, postings_count });
        Ok(())
    }

    fn set_posting_scores(
        &self,
        term: &str,
        path_id: &str,
        tf: f64,
        tf_idf: f64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(posting) = inner
            .postings
            .get_mut(term)
            .and_then(|postings| postings.get_mut(path_id))
        {
            posting.tf = tf;
            posting.tf_idf = tf_idf;
        }
        Ok(())
    }

    fn set_bigram_stats(&self, bigram: &str, idf: f64, postings_count: usize) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner
            .bigrams
            .insert(bigram.to_string(), TermStats { idf, postings_count });
        Ok(())
    }

    fn set_bigram_posting_scores(
        &self,
        bigram: &str,
        path_id: &str,
        tf: f64,
        tf_idf: f64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(posting) = inner
            .bigram_postings
            .get_mut(bigram)
            .and_then(|postings| postings.get_mut(path_id))
        {
            posting.tf = tf;
            posting.tf_idf = tf_idf;
        }
        Ok(())
    }

    fn list_terms_alpha(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.postings.keys().cloned().collect())
    }

    fn list_bigrams_alpha(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.bigram_postings.keys().cloned().collect())
    }

    fn distinct_doc_count(&self) -> StoreResult<usize> {
        let inner = self.inner.read().unwrap();
        let distinct: std::collections::HashSet<&String> = inner
            .postings
            .values()
            .flat_map(|postings| postings.keys())
            .collect();
        Ok(distinct.len())
    }

    fn distinct_bigram_doc_count(&self) -> StoreResult<usize> {
        let inner = self.inner.read().unwrap();
        let distinct: std::collections::HashSet<&String> = inner
            .bigram_postings
            .values()
            .flat_map(|postings| postings.keys())
            .collect();
        Ok(distinct.len())
    }

    fn posting_counts(&self) -> StoreResult<HashMap<String, usize>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .postings
            .iter()
            .map(|(term, postings)| (term.clone(), postings.len()))
            .collect())
    }

    fn bigram_posting_counts(&self) -> StoreResult<HashMap<String, usize>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .bigram_postings
            .iter()
            .map(|(bigram, postings)| (bigram.clone(), postings.len()))
            .collect())
    }

    fn weighted_freqs(&self, term: &str) -> StoreResult<Vec<(String, u64)>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<(String, u64)> = inner
            .postings
            .get(term)
            .map(|postings| {
                postings
                    .iter()
                    .map(|(path_id, posting)| (path_id.clone(), posting.weighted_freq))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }

    fn bigram_freqs(&self, bigram: &str) -> StoreResult<Vec<(String, u64)>> {
        let inner = self.inner.read().unwrap();
        let mut rows: Vec<(String, u64)> = inner
            .bigram_postings
            .get(bigram)
            .map(|postings| {
                postings
                    .iter()
                    .map(|(path_id, posting)| (path_id.clone(), posting.weighted_freq))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }

    fn term_stats(&self) -> StoreResult<HashMap<String, TermStats>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.terms.clone())
    }

    fn term_postings(&self, term: &str) -> StoreResult<HashMap<String, PostingScore>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .postings
            .get(term)
            .map(|postings| {
                postings
                    .iter()
                    .map(|(path_id, posting)| {
                        (
                            path_id.clone(),
                            PostingScore {
                                tf: posting.tf,
                                tf_idf: posting.tf_idf,
                                positional_idx: posting.positional_idx.clone(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn bigram_postings(&self, bigram: &str) -> StoreResult<HashMap<String, BigramScore>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .bigram_postings
            .get(bigram)
            .map(|postings| {
                postings
                    .iter()
                    .map(|(path_id, posting)| {
                        (
                            path_id.clone(),
                            BigramScore {
                                tf: posting.tf,
                                tf_idf: posting.tf_idf,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn documents_with_any(&self, terms: &[String]) -> StoreResult<Vec<DocLengthRow>> {
        let inner = self.inner.read().unwrap();
        // (doc_count, sum_tfidf, sum of squares) per candidate document
        let mut grouped: HashMap<String, (usize, f64, f64)> = HashMap::new();
        for term in terms {
            if let Some(postings) = inner.postings.get(term) {
                for (path_id, posting) in postings {
                    let entry = grouped.entry(path_id.clone()).or_insert((0, 0.0, 0.0));
                    entry.0 += 1;
                    entry.1 += posting.tf_idf;
                    entry.2 += posting.tf_idf * posting.tf_idf;
                }
            }
        }
        let mut rows: Vec<DocLengthRow> = grouped
            .into_iter()
            .map(|(path_id, (doc_count, sum_tfidf, len_pow2))| DocLengthRow {
                path_id,
                doc_count,
                sum_tfidf,
                len: len_pow2.sqrt(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.doc_count
                .cmp(&a.doc_count)
                .then_with(|| {
                    b.sum_tfidf
                        .partial_cmp(&a.sum_tfidf)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.path_id.cmp(&b.path_id))
        });
        Ok(rows)
    }

    fn all_documents(&self) -> StoreResult<HashMap<String, DocumentRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.documents.clone())
    }
}
