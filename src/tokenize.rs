use crate::lexicon::{self, Lexicon};
use indexmap::IndexMap;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

/// Word/punctuation split rule: runs of word characters are candidate tokens,
/// runs of punctuation act as separators (and never survive the filter).
static WORD_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]+").unwrap());

/// Lowercases and splits `content`, keeping tokens that pass the lexicon's
/// acceptance rule.
pub fn tokenize(content: &str, lexicon: &Lexicon) -> Vec<String> {
    let lowered = content.to_lowercase();
    WORD_PUNCT
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|token| lexicon.accept_token(token))
        .collect()
}

/// Like [`tokenize`] but emits `(token, char_offset)` pairs, preserving the
/// character position of each surviving token in the lowercased text.
pub fn tokenize_span(content: &str, lexicon: &Lexicon) -> Vec<(String, usize)> {
    let lowered = content.to_lowercase();
    let mut tokens = Vec::new();
    // Running byte -> char cursor; matches arrive in ascending order.
    let mut byte_cursor = 0usize;
    let mut char_cursor = 0usize;

    for m in WORD_PUNCT.find_iter(&lowered) {
        char_cursor += lowered[byte_cursor..m.start()].chars().count();
        byte_cursor = m.start();

        let token = m.as_str();
        if lexicon.accept_token(token) {
            tokens.push((token.to_string(), char_cursor));
        }
    }

    tokens
}

/// Lemmatizes each spanned token and folds it into
/// `lemma -> (count, offsets)`, offsets in encounter order.
pub fn word_frequency_spans(tokens: &[(String, usize)]) -> IndexMap<String, (u64, Vec<usize>)> {
    let mut freq: IndexMap<String, (u64, Vec<usize>)> = IndexMap::new();
    for (token, offset) in tokens {
        let lemma = lexicon::lemmatize(token);
        let entry = freq.entry(lemma).or_insert((0, Vec::new()));
        entry.0 += 1;
        entry.1.push(*offset);
    }
    freq
}

/// Lemmatizes each token and folds it into `lemma -> count`.
pub fn word_frequency(tokens: &[String]) -> IndexMap<String, u64> {
    let mut freq: IndexMap<String, u64> = IndexMap::new();
    for token in tokens {
        *freq.entry(lexicon::lemmatize(token)).or_insert(0) += 1;
    }
    freq
}

/// Bigram frequency over `content`: filtered tokens are lemmatized, taken as
/// consecutive pairs, and joined with no separator. The map preserves first
/// encounter order, which the query scorer relies on.
pub fn bigram_freq(content: &str, lexicon: &Lexicon) -> IndexMap<String, u64> {
    let lemmas: Vec<String> = tokenize(content, lexicon)
        .iter()
        .map(|token| lexicon::lemmatize(token))
        .collect();

    let mut freq: IndexMap<String, u64> = IndexMap::new();
    for (first, second) in lemmas.iter().tuple_windows() {
        *freq.entry(format!("{first}{second}")).or_insert(0) += 1;
    }
    freq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::load(None)
    }

    #[test]
    fn test_tokenize_filters_and_lowercases() {
        let tokens = tokenize("Hello, WORLD! ab x9 punctuation...", &lexicon());
        assert_eq!(tokens, vec!["hello", "world", "punctuation"]);
    }

    #[test]
    fn test_tokenize_span_offsets() {
        let tokens = tokenize_span("hello big world", &lexicon());
        // "big" is dropped (too short) but offsets stay anchored to the text
        assert_eq!(
            tokens,
            vec![("hello".to_string(), 0), ("world".to_string(), 10)]
        );
    }

    #[test]
    fn test_tokenize_span_offsets_are_chars() {
        // Multibyte character before the token must not skew the offset
        let tokens = tokenize_span("é hello", &lexicon());
        assert_eq!(tokens, vec![("hello".to_string(), 2)]);
    }

    #[test]
    fn test_word_frequency_spans() {
        let tokens = tokenize_span("hello world hello", &lexicon());
        let freq = word_frequency_spans(&tokens);
        assert_eq!(freq.get("hello"), Some(&(2, vec![0, 12])));
        assert_eq!(freq.get("world"), Some(&(1, vec![6])));
    }

    #[test]
    fn test_word_frequency_lemmatizes() {
        let tokens = vec!["apples".to_string(), "apple".to_string()];
        let freq = word_frequency(&tokens);
        assert_eq!(freq.get("apple"), Some(&2));
    }

    #[test]
    fn test_bigram_freq_joins_pairs() {
        let freq = bigram_freq("machine learning makes machine learning", &lexicon());
        assert_eq!(freq.get("machinelearning"), Some(&2));
        assert_eq!(freq.get("learningmake"), Some(&1));
        assert_eq!(freq.get("makemachine"), Some(&1));
        // encounter order is preserved
        let keys: Vec<&String> = freq.keys().collect();
        assert_eq!(keys[0], "machinelearning");
    }

    #[test]
    fn test_bigram_freq_skips_filtered_tokens() {
        // "of" is a stopword and "ai" is too short; the pair bridges the gap
        let freq = bigram_freq("history of artificial intelligence", &lexicon());
        assert_eq!(freq.get("historyartificial"), Some(&1));
        assert_eq!(freq.get("artificialintelligence"), Some(&1));
    }
}
