use crate::lexicon::{self, Lexicon};
use crate::models::{BigramScore, DocumentRecord, PageResult, PostingScore, SearchResponse, TermStats};
use crate::store::Repository;
use crate::tokenize::{bigram_freq, tokenize_span, word_frequency_spans};
use ahash::AHashMap;
use anyhow::Result;
use indexmap::IndexMap;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Scale applied to a document's authority score before it joins the blend.
pub const PR_MULTIPLIER: f64 = 20.0;
/// Blend ratio for bigram hits against the running cosine score.
pub const BIGRAM_MULTIPLIER: f64 = 0.5;
/// Fixed page size of the result listing.
pub const RESULTS_DISPLAYED: usize = 20;
const QUERY_CACHE_SIZE: usize = 64;

/// Full ranked output for one query, cached before pagination.
pub struct RankedResults {
    /// `(path_id, score)`, best first.
    pub ranked: Vec<(String, f64)>,
    pub total: usize,
    pub elapsed: f64,
    pub lemmatized: Vec<String>,
}

struct QueryTerm {
    tf_idf: Option<f64>,
    cosine: Option<f64>,
}

/// Answers free-text queries against the built index. Term stats and the
/// document map are preloaded once; recent queries are kept in a small LRU
/// keyed by their lemmatized token sequence.
pub struct SearchEngine {
    store: Arc<dyn Repository>,
    lexicon: Lexicon,
    term_stats: AHashMap<String, TermStats>,
    documents: AHashMap<String, DocumentRecord>,
    cache: Mutex<LruCache<String, Arc<RankedResults>>>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn Repository>, lexicon: Lexicon) -> Result<Self> {
        // First lemmatization loads the tables; do it before the first query.
        lexicon::preload();
        let term_stats = store.term_stats()?.into_iter().collect();
        let documents = store.all_documents()?.into_iter().collect();
        Ok(SearchEngine {
            store,
            lexicon,
            term_stats,
            documents,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_SIZE).expect("cache size is nonzero"),
            )),
        })
    }

    /// One query+page request. Never fails: store trouble degrades to an
    /// empty result list with a zero count.
    pub fn search(&self, query: &str, start: usize) -> SearchResponse {
        match self.retrieve(query) {
            Ok(results) => SearchResponse {
                results: self.construct_results(&results.ranked, start),
                number_results_found: results.total,
                query_speed: results.elapsed,
                search_lemmatized: results.lemmatized.clone(),
            },
            Err(err) => {
                warn!("query {query:?} failed: {err}");
                SearchResponse {
                    results: Vec::new(),
                    number_results_found: 0,
                    query_speed: 0.0,
                    search_lemmatized: Vec::new(),
                }
            }
        }
    }

    /// Ranks all candidate documents for `query`, consulting the cache
    /// first. The cache key is the lemmatized token sequence, so reordered
    /// queries (which produce different bigrams) never alias.
    pub fn retrieve(&self, query: &str) -> Result<Arc<RankedResults>> {
        let tokens = tokenize_span(query, &self.lexicon);
        let cache_key = tokens
            .iter()
            .map(|(token, _)| lexicon::lemmatize(token))
            .collect::<Vec<_>>()
            .join(" ");

        if let Some(hit) = self.cache.lock().unwrap().get(&cache_key) {
            debug!("cache hit for {cache_key:?}");
            return Ok(Arc::clone(hit));
        }

        let results = Arc::new(self.rank(query, &tokens)?);
        self.cache
            .lock()
            .unwrap()
            .put(cache_key, Arc::clone(&results));
        Ok(results)
    }

    fn rank(&self, query: &str, tokens: &[(String, usize)]) -> Result<RankedResults> {
        let started = Instant::now();

        let word_freq = word_frequency_spans(tokens);
        let query_bigrams = bigram_freq(query, &self.lexicon);

        let mut lemmatized: Vec<String> = query.split(' ').map(String::from).collect();
        lemmatized.extend(word_freq.keys().cloned());

        // Query-side tf·idf and cosine weights; unknown terms contribute
        // nothing to scoring.
        let mut query_terms: IndexMap<String, QueryTerm> = IndexMap::new();
        for (term, (freq, _)) in &word_freq {
            let tf = if *freq > 0 {
                1.0 + (*freq as f64).log10()
            } else {
                0.0
            };
            let tf_idf = self.term_stats.get(term).map(|stats| tf * stats.idf);
            query_terms.insert(
                term.clone(),
                QueryTerm {
                    tf_idf,
                    cosine: None,
                },
            );
        }
        let query_length = query_terms
            .values()
            .filter_map(|t| t.tf_idf)
            .map(|tf_idf| tf_idf * tf_idf)
            .sum::<f64>()
            .sqrt();
        if query_length > 0.0 {
            for term in query_terms.values_mut() {
                term.cosine = term.tf_idf.map(|tf_idf| tf_idf / query_length);
            }
        }

        let terms: Vec<String> = word_freq.keys().cloned().collect();
        let doc_rows = self.store.documents_with_any(&terms)?;

        let mut scored: Vec<(String, f64)> = Vec::with_capacity(doc_rows.len());
        if tokens.len() == 1 {
            // A single-token query skips cosine normalization; the score is
            // the term's tf·idf in each document.
            for row in &doc_rows {
                scored.push((row.path_id.clone(), row.sum_tfidf));
            }
        } else {
            let term_postings: Vec<(String, HashMap<String, PostingScore>)> = terms
                .iter()
                .map(|term| Ok((term.clone(), self.store.term_postings(term)?)))
                .collect::<Result<_>>()?;
            let bigram_postings: Vec<(String, HashMap<String, BigramScore>)> = query_bigrams
                .keys()
                .map(|bigram| Ok((bigram.clone(), self.store.bigram_postings(bigram)?)))
                .collect::<Result<_>>()?;

            for row in &doc_rows {
                let mut score = 0.0;
                for (term, postings) in &term_postings {
                    let Some(posting) = postings.get(&row.path_id) else {
                        continue;
                    };
                    let Some(cosine_query) = query_terms.get(term).and_then(|t| t.cosine) else {
                        continue;
                    };
                    if row.len > 0.0 {
                        score += cosine_query * (posting.tf_idf / row.len);
                    }
                }
                // Each matching bigram contracts the running score toward
                // its own tf·idf, in query encounter order.
                for (_, postings) in &bigram_postings {
                    if let Some(posting) = postings.get(&row.path_id) {
                        score = score * (1.0 - BIGRAM_MULTIPLIER)
                            + posting.tf_idf * BIGRAM_MULTIPLIER;
                    }
                }
                scored.push((row.path_id.clone(), score));
            }
        }

        for (path_id, score) in scored.iter_mut() {
            if let Some(authority) = self.documents.get(path_id).and_then(|d| d.authority) {
                *score += authority * PR_MULTIPLIER;
            }
        }

        // Stable sort keeps the (doc_count, sum_tfidf) order for ties.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let elapsed = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        Ok(RankedResults {
            total: scored.len(),
            ranked: scored,
            elapsed,
            lemmatized,
        })
    }

    /// Projects one page of the ranked list to `{url, title, snippet}` using
    /// the preloaded document map.
    pub fn construct_results(&self, ranked: &[(String, f64)], start: usize) -> Vec<PageResult> {
        ranked
            .iter()
            .skip(start)
            .take(RESULTS_DISPLAYED)
            .map(|(path_id, _)| {
                let doc = self.documents.get(path_id);
                PageResult {
                    url: doc.map(|d| d.url.clone()).unwrap_or_default(),
                    title: doc.and_then(|d| d.title.clone()).unwrap_or_default(),
                    snippet: doc.and_then(|d| d.snippet.clone()).unwrap_or_default(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BigramInsert, PostingInsert};
    use crate::store::{MemoryRepository, Repository};

    fn posting(term: &str, natural: u64, weighted: u64) -> PostingInsert {
        PostingInsert {
            term: term.to_string(),
            natural_freq: natural,
            positional_idx: (0..natural as usize).collect(),
            weighted_freq: weighted,
        }
    }

    /// Two documents sharing "apple", one also carrying "banana", scored.
    fn seeded_store() -> Arc<MemoryRepository> {
        let store = Arc::new(MemoryRepository::new());
        store.put_document("0/0", "a.edu").unwrap();
        store.put_document("0/1", "b.edu").unwrap();
        store.set_title_snippet("0/0", "Apples", "All about apples").unwrap();
        store.set_title_snippet("0/1", "Fruit", "Apples and bananas").unwrap();

        store.upsert_unigram_posting("0/0", &posting("apple", 2, 12)).unwrap();
        store.upsert_unigram_posting("0/1", &posting("apple", 1, 1)).unwrap();
        store.upsert_unigram_posting("0/1", &posting("banana", 1, 1)).unwrap();
        crate::index::score_terms(store.as_ref()).unwrap();
        store
    }

    fn engine(store: Arc<MemoryRepository>) -> SearchEngine {
        SearchEngine::new(store, Lexicon::load(None)).unwrap()
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let engine = engine(Arc::new(MemoryRepository::new()));
        let response = engine.search("anything", 0);
        assert!(response.results.is_empty());
        assert_eq!(response.number_results_found, 0);
    }

    #[test]
    fn test_unknown_term_contributes_nothing() {
        let engine = engine(seeded_store());
        let response = engine.search("xylophone", 0);
        assert_eq!(response.number_results_found, 0);
    }

    #[test]
    fn test_single_token_query_scores_by_tfidf() {
        let engine = engine(seeded_store());
        let response = engine.search("banana", 0);
        assert_eq!(response.number_results_found, 1);
        assert_eq!(response.results[0].url, "b.edu");
        assert_eq!(response.results[0].title, "Fruit");
    }

    #[test]
    fn test_multiword_prefers_document_with_both_terms() {
        let engine = engine(seeded_store());
        let response = engine.search("apple banana", 0);
        assert_eq!(response.number_results_found, 2);
        assert_eq!(response.results[0].url, "b.edu");
    }

    #[test]
    fn test_queries_are_deterministic() {
        let engine = engine(seeded_store());
        let first = engine.search("apple banana", 0);
        let second = engine.search("apple banana", 0);
        assert_eq!(first.results, second.results);
        assert_eq!(first.number_results_found, second.number_results_found);
    }

    #[test]
    fn test_cache_serves_pagination_without_recompute() {
        let engine = engine(seeded_store());
        let full = engine.retrieve("apple banana").unwrap();
        let again = engine.retrieve("apple banana").unwrap();
        assert!(Arc::ptr_eq(&full, &again));
    }

    #[test]
    fn test_reordered_query_is_not_aliased() {
        let engine = engine(seeded_store());
        let ab = engine.retrieve("apple banana").unwrap();
        let ba = engine.retrieve("banana apple").unwrap();
        assert!(!Arc::ptr_eq(&ab, &ba));
    }

    #[test]
    fn test_authority_breaks_ties() {
        let store = Arc::new(MemoryRepository::new());
        store.put_document("0/0", "a.edu").unwrap();
        store.put_document("0/1", "b.edu").unwrap();
        store.upsert_unigram_posting("0/0", &posting("apple", 1, 2)).unwrap();
        store.upsert_unigram_posting("0/1", &posting("apple", 1, 2)).unwrap();
        crate::index::score_terms(store.as_ref()).unwrap();
        store.set_authority("b.edu", 0.9).unwrap();
        store.set_authority("a.edu", 0.1).unwrap();

        let engine = engine(store);
        let response = engine.search("apple", 0);
        assert_eq!(response.results[0].url, "b.edu");
    }

    #[test]
    fn test_bigram_contracts_score() {
        let store = Arc::new(MemoryRepository::new());
        store.put_document("0/0", "a.edu").unwrap();
        store.put_document("0/1", "b.edu").unwrap();
        // same unigram content, only 0/0 carries the query bigram
        for path_id in ["0/0", "0/1"] {
            store.upsert_unigram_posting(path_id, &posting("machine", 1, 1)).unwrap();
            store.upsert_unigram_posting(path_id, &posting("learning", 1, 1)).unwrap();
        }
        store
            .upsert_bigram_posting(
                "0/0",
                &BigramInsert {
                    bigram: "machinelearning".to_string(),
                    weighted_freq: 5,
                },
            )
            .unwrap();
        // one bigram-only document elsewhere so the bigram idf is positive
        store
            .upsert_bigram_posting(
                "0/2",
                &BigramInsert {
                    bigram: "learningmachine".to_string(),
                    weighted_freq: 1,
                },
            )
            .unwrap();
        crate::index::score_terms(store.as_ref()).unwrap();
        crate::index::score_bigrams(store.as_ref()).unwrap();

        let engine = engine(store);
        let response = engine.search("machine learning", 0);
        assert_eq!(response.number_results_found, 2);
        assert_eq!(response.results[0].url, "a.edu");
    }

    #[test]
    fn test_pagination_slices() {
        let store = Arc::new(MemoryRepository::new());
        for i in 0..47 {
            let path_id = format!("0/{i}");
            let url = format!("u{i}.edu");
            store.put_document(&path_id, &url).unwrap();
            store
                .upsert_unigram_posting(&path_id, &posting("apple", 1, (100 - i) as u64))
                .unwrap();
        }
        // a second term so idf stays positive for apple
        store.upsert_unigram_posting("0/0", &posting("pear", 1, 1)).unwrap();
        crate::index::score_terms(store.as_ref()).unwrap();

        let engine = engine(store);
        let full = engine.retrieve("apple").unwrap();
        assert_eq!(full.total, 47);
        assert_eq!(engine.construct_results(&full.ranked, 0).len(), 20);
        assert_eq!(engine.construct_results(&full.ranked, 20).len(), 20);
        assert_eq!(engine.construct_results(&full.ranked, 40).len(), 7);
        assert_eq!(engine.construct_results(&full.ranked, 60).len(), 0);

        // consecutive pages reassemble the full ranked list
        let mut pages = Vec::new();
        for start in [0, 20, 40] {
            pages.extend(engine.construct_results(&full.ranked, start));
        }
        assert_eq!(pages.len(), 47);
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        let expected: Vec<String> = full
            .ranked
            .iter()
            .map(|(path_id, _)| {
                let idx = path_id.trim_start_matches("0/");
                format!("u{idx}.edu")
            })
            .collect();
        assert_eq!(urls, expected);
    }

    #[test]
    fn test_search_lemmatized_contains_raw_and_lemmas() {
        let engine = engine(seeded_store());
        let results = engine.retrieve("apples bananas").unwrap();
        assert_eq!(
            results.lemmatized,
            vec!["apples", "bananas", "apple", "banana"]
        );
    }
}
