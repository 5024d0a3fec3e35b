use crate::analyzer::{Analyzer, DocumentContent};
use crate::corpus::Corpus;
use crate::lexicon::Lexicon;
use crate::models::{BigramInsert, PostingInsert};
use crate::store::Repository;
use crate::tokenize::{bigram_freq, tokenize, tokenize_span, word_frequency, word_frequency_spans};
use anyhow::Result;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

pub const SNIPPET_MAX: usize = 350;
pub const TITLE_MAX: usize = 60;
pub const WEIGHT_TITLE: u64 = 6;
pub const WEIGHT_H1H2: u64 = 3;
pub const WEIGHT_H3H6: u64 = 2;
pub const WEIGHT_STRONG: u64 = 1;
pub const WEIGHT_ANCHOR: u64 = 1;

/// Documents analyzed per parallel batch before the serial merge.
const BATCH: usize = 256;

/// Everything one document contributes to the index.
struct DocumentIndex {
    path_id: String,
    title_snippet: Option<(String, String)>,
    postings: Vec<PostingInsert>,
    bigrams: Vec<BigramInsert>,
}

/// Builds the inverted index for a whole corpus. Analysis runs in parallel
/// batches; posting appends are merged serially so the store sees one writer.
pub struct IndexBuilder<'a> {
    corpus: &'a Corpus,
    lexicon: &'a Lexicon,
    store: &'a dyn Repository,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(corpus: &'a Corpus, lexicon: &'a Lexicon, store: &'a dyn Repository) -> Self {
        IndexBuilder {
            corpus,
            lexicon,
            store,
        }
    }

    pub fn build(&self) -> Result<()> {
        // Every bookkeeping entry is recorded, including documents that later
        // fail analysis and contribute nothing to the index.
        for (path_id, url) in self.corpus.entries() {
            if let Err(err) = self.store.put_document(path_id, url) {
                warn!("put_document {path_id}: {err}");
            }
        }
        info!("recorded {} documents", self.corpus.len());

        let analyzer = Analyzer::new(self.corpus);
        let total = self.corpus.len();
        let mut processed = 0usize;

        for batch in self.corpus.entries().chunks(BATCH) {
            let outputs: Vec<DocumentIndex> = batch
                .par_iter()
                .map(|(path_id, _)| self.build_document(&analyzer, path_id))
                .collect();

            for output in outputs {
                self.persist(&output);
                processed += 1;
                debug!(
                    "indexed {} ({processed}/{total}, {:.2}%)",
                    output.path_id,
                    processed as f64 / total.max(1) as f64 * 100.0
                );
            }
        }

        info!("indexed {processed} documents");
        Ok(())
    }

    fn build_document(&self, analyzer: &Analyzer, path_id: &str) -> DocumentIndex {
        let content = analyzer.analyze(path_id);
        let title_snippet = choose_title_snippet(&content);

        let title_text = content.title.as_deref().unwrap_or("");
        let title_tokens = tokenize_span(title_text, self.lexicon);
        let title_freq = word_frequency_spans(&title_tokens);

        // Body offsets are shifted past the title so title+body form one
        // virtual position stream.
        let title_offset = title_tokens
            .last()
            .map(|(token, offset)| offset + token.chars().count())
            .unwrap_or(0);
        let body_tokens: Vec<(String, usize)> = tokenize_span(&content.body, self.lexicon)
            .into_iter()
            .map(|(token, offset)| (token, offset + title_offset))
            .collect();
        let body_freq = word_frequency_spans(&body_tokens);

        let h1h2_freq = field_frequency(content.h1h2.as_deref(), self.lexicon);
        let h3h6_freq = field_frequency(content.h3h6.as_deref(), self.lexicon);
        let strong_freq = field_frequency(content.strong.as_deref(), self.lexicon);
        let anchor_freq = field_frequency(content.anchor.as_deref(), self.lexicon);

        let mut weighted: IndexMap<String, u64> = IndexMap::new();
        for (term, (count, _)) in &title_freq {
            *weighted.entry(term.clone()).or_insert(0) += count * WEIGHT_TITLE;
        }
        for (term, (count, _)) in &body_freq {
            *weighted.entry(term.clone()).or_insert(0) += count;
        }
        for (freq, weight) in [
            (&h1h2_freq, WEIGHT_H1H2),
            (&h3h6_freq, WEIGHT_H3H6),
            (&strong_freq, WEIGHT_STRONG),
            (&anchor_freq, WEIGHT_ANCHOR),
        ] {
            for (term, count) in freq {
                *weighted.entry(term.clone()).or_insert(0) += count * weight;
            }
        }

        // Natural frequency and positions over the combined stream.
        let mut stream = title_tokens;
        stream.extend(body_tokens);
        let natural = word_frequency_spans(&stream);

        // Body bigrams, boosted when the same bigram occurs in the title.
        let mut body_bigram = bigram_freq(&content.body, self.lexicon);
        let title_bigram = bigram_freq(title_text, self.lexicon);
        for bigram in title_bigram.keys() {
            *body_bigram.entry(bigram.clone()).or_insert(0) += WEIGHT_TITLE;
        }

        let postings = if natural.is_empty() || weighted.is_empty() {
            Vec::new()
        } else {
            natural
                .iter()
                .map(|(term, (count, positions))| PostingInsert {
                    term: term.clone(),
                    natural_freq: *count,
                    positional_idx: positions.clone(),
                    weighted_freq: weighted.get(term).copied().unwrap_or(0),
                })
                .collect()
        };

        let bigrams = body_bigram
            .into_iter()
            .map(|(bigram, weighted_freq)| BigramInsert {
                bigram,
                weighted_freq,
            })
            .collect();

        DocumentIndex {
            path_id: path_id.to_string(),
            title_snippet,
            postings,
            bigrams,
        }
    }

    fn persist(&self, output: &DocumentIndex) {
        if let Some((title, snippet)) = &output.title_snippet {
            if let Err(err) = self.store.set_title_snippet(&output.path_id, title, snippet) {
                warn!("set_title_snippet {}: {err}", output.path_id);
            }
        }
        for posting in &output.postings {
            if let Err(err) = self.store.upsert_unigram_posting(&output.path_id, posting) {
                warn!("upsert posting {}/{}: {err}", posting.term, output.path_id);
            }
        }
        for bigram in &output.bigrams {
            if let Err(err) = self.store.upsert_bigram_posting(&output.path_id, bigram) {
                warn!("upsert bigram {}/{}: {err}", bigram.bigram, output.path_id);
            }
        }
    }
}

fn field_frequency(field: Option<&str>, lexicon: &Lexicon) -> IndexMap<String, u64> {
    word_frequency(&tokenize(field.unwrap_or(""), lexicon))
}

/// Title/snippet sources in priority order: title+paragraph, body+paragraph
/// when the title is missing, title+body when the paragraph is missing, bare
/// title when both are. A document with neither title nor paragraph keeps
/// empty derived fields.
fn choose_title_snippet(content: &DocumentContent) -> Option<(String, String)> {
    match (&content.title, &content.paragraph) {
        (Some(title), Some(paragraph)) => Some((
            ascii_collapse(title, TITLE_MAX),
            ascii_collapse(paragraph, SNIPPET_MAX),
        )),
        (None, Some(paragraph)) => Some((
            ascii_collapse(&content.body, TITLE_MAX),
            ascii_collapse(paragraph, SNIPPET_MAX),
        )),
        (Some(title), None) => Some((
            ascii_collapse(title, TITLE_MAX),
            ascii_collapse(&content.body, SNIPPET_MAX),
        )),
        (None, None) => None,
    }
}

/// Drops non-ASCII characters, collapses whitespace runs to single spaces,
/// and truncates to `max_chars`.
fn ascii_collapse(text: &str, max_chars: usize) -> String {
    let ascii: String = text.chars().filter(|c| c.is_ascii()).collect();
    let collapsed = ascii.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}
