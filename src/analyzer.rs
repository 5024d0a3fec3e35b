use crate::corpus::Corpus;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Documents above this size with no `<body>` are truncated before analysis.
pub const FILE_SIZE_CAP: u64 = 500_000;
/// Numeric-to-alpha ratio above which numeric tokens are suppressed.
pub const NUMBER_ALPHA: f64 = 0.20;
const TRUNCATE_LINES: usize = 500;

/// Words that are only numbers or decimals/floats (including negatives).
static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\b\d*\.?\d+(?:e[+-]\d*)?\b").unwrap());

/// Bare or schemeful URLs embedded in non-HTML content.
static LINK_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:(?:http|https)://)?[-a-zA-Z0-9.]{2,256}\.[a-z]{2,4}\b(?:/[-a-zA-Z0-9@:%_+.~#?&/=]*)?")
        .unwrap()
});

/// Open `<body>` tag, however it is cased.
static BODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body[\s/>]").unwrap());

/// HTML comments, or a single tag with its close-slash and self-close marks.
static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9]*)(?:\s[^>]*?)?(/?)>").unwrap()
});

/// Elements that never take a closing tag.
static VOID_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ])
});

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static SEL_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static SEL_H1H2: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2").unwrap());
static SEL_H3H6: Lazy<Selector> = Lazy::new(|| Selector::parse("h3, h4, h5, h6").unwrap());
static SEL_STRONG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("strong, b, em, i, u, dl, ol, ul").unwrap());
static SEL_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SEL_SCRIPT_STYLE: Lazy<Selector> = Lazy::new(|| Selector::parse("script, style").unwrap());

/// Textual fields extracted from one corpus document, grouped by weight
/// class. Absent fields stay `None`; a document that cannot be read at all
/// produces the all-empty record.
#[derive(Debug, Clone, Default)]
pub struct DocumentContent {
    pub path_id: String,
    /// True when no `<body>` open tag was found in the repaired markup.
    pub broken_body: bool,
    pub number_alpha_ratio: f64,
    pub removed_numbers: bool,
    pub title: Option<String>,
    pub body: String,
    pub paragraph: Option<String>,
    pub h1h2: Option<String>,
    pub h3h6: Option<String>,
    pub strong: Option<String>,
    pub anchor: Option<String>,
}

/// Multi-stage analyzer over raw corpus HTML: markup repair, broken-body and
/// numeric-heavy fallbacks, then per-tag-group text extraction.
pub struct Analyzer<'a> {
    corpus: &'a Corpus,
}

impl<'a> Analyzer<'a> {
    pub fn new(corpus: &'a Corpus) -> Self {
        Analyzer { corpus }
    }

    pub fn analyze(&self, path_id: &str) -> DocumentContent {
        let mut content = DocumentContent {
            path_id: path_id.to_string(),
            ..Default::default()
        };

        let raw = match self.corpus.read_document(path_id) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("document {path_id} not readable: {err}");
                return content;
            }
        };

        let mut raw = repair_markup(&raw);

        if !BODY_OPEN.is_match(&raw) {
            content.broken_body = true;
            // Oversized non-HTML content gets cut down before tokenization.
            if self.corpus.document_size(path_id).unwrap_or(0) > FILE_SIZE_CAP {
                raw = truncate_lines(&raw, TRUNCATE_LINES);
            }
            raw = blank_matches(&LINK_TOKEN, &raw);
        }

        let ratio = number_alpha_ratio(&raw);
        content.number_alpha_ratio = ratio;
        if ratio > NUMBER_ALPHA {
            raw = blank_matches(&NUMBER_TOKEN, &raw);
            content.removed_numbers = true;
        }

        let mut html = Html::parse_document(&raw);
        strip_elements(&mut html, &SEL_SCRIPT_STYLE);

        content.title = html
            .select(&SEL_TITLE)
            .next()
            .map(|el| el.text().collect::<String>());

        content.body = if content.broken_body {
            html.root_element().text().collect::<String>()
        } else {
            html.select(&SEL_BODY)
                .next()
                .map(|el| el.text().collect::<String>())
                .unwrap_or_default()
        };

        content.paragraph = joined_text(&html, &SEL_PARAGRAPH);
        content.h1h2 = joined_text(&html, &SEL_H1H2);
        content.h3h6 = joined_text(&html, &SEL_H3H6);
        content.strong = joined_text(&html, &SEL_STRONG);
        content.anchor = joined_text(&html, &SEL_ANCHOR);

        content
    }
}

/// Text of every element matching `selector`, joined with single spaces.
/// `None` when nothing matches, so callers can distinguish "absent" from
/// "present but empty".
fn joined_text(html: &Html, selector: &Selector) -> Option<String> {
    let parts: Vec<String> = html
        .select(selector)
        .map(|el| el.text().collect::<String>())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Detaches every subtree matching `selector` from the parsed document.
fn strip_elements(html: &mut Html, selector: &Selector) {
    let ids: Vec<_> = html.select(selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }
}

enum Fix {
    AppendClose(String),
    PrependOpen(String),
}

/// Line-local repair of unbalanced tags, in the style of a tidy error pass:
/// a close tag with no matching open gets the open tag prepended to its
/// line; an open tag still unclosed when its ancestor closes (or at end of
/// input) gets the close tag appended to the line where that was detected.
fn repair_markup(raw: &str) -> String {
    // split('\n') always yields at least one line
    let mut lines: Vec<String> = raw.split('\n').map(String::from).collect();

    // Byte offset of each line start, for match -> line resolution.
    let mut line_starts = vec![0usize];
    for (idx, byte) in raw.bytes().enumerate() {
        if byte == b'\n' {
            line_starts.push(idx + 1);
        }
    }
    let line_of = |offset: usize| line_starts.partition_point(|&s| s <= offset) - 1;

    let mut stack: Vec<String> = Vec::new();
    let mut fixes: Vec<(usize, Fix)> = Vec::new();

    for caps in TAG.captures_iter(raw) {
        let Some(name_match) = caps.get(2) else {
            continue; // comment
        };
        let name = name_match.as_str().to_lowercase();
        let closing = &caps[1] == "/";
        let self_closing = &caps[3] == "/";
        if VOID_ELEMENTS.contains(name.as_str()) || self_closing {
            continue;
        }

        let line = line_of(caps.get(0).map(|m| m.start()).unwrap_or(0));
        if !closing {
            stack.push(name);
        } else if let Some(pos) = stack.iter().rposition(|open| *open == name) {
            // Everything opened inside the matching tag is missing its close.
            for unclosed in stack.drain(pos + 1..).rev() {
                fixes.push((line, Fix::AppendClose(unclosed)));
            }
            stack.pop();
        } else {
            fixes.push((line, Fix::PrependOpen(name)));
        }
    }

    let last_line = lines.len() - 1;
    for unclosed in stack.drain(..).rev() {
        fixes.push((last_line, Fix::AppendClose(unclosed)));
    }

    for (line, fix) in fixes {
        match fix {
            Fix::AppendClose(tag) => lines[line].push_str(&format!("</{tag}>")),
            Fix::PrependOpen(tag) => lines[line].insert_str(0, &format!("<{tag}>")),
        }
    }

    lines.join("\n")
}

/// Replaces every match with spaces of the match's own length, keeping the
/// offsets of the surrounding text unchanged.
fn blank_matches(re: &Regex, text: &str) -> String {
    re.replace_all(text, |caps: &Captures| " ".repeat(caps[0].len()))
        .into_owned()
}

fn truncate_lines(raw: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    if lines.len() > max_lines {
        lines[..max_lines].join("\n")
    } else {
        raw.to_string()
    }
}

/// `digits / (digits + letters)` over the text, rounded to two decimals.
/// Text with no alphanumeric characters at all counts as fully numeric.
fn number_alpha_ratio(content: &str) -> f64 {
    let mut digits = 0usize;
    let mut alnum = 0usize;
    for c in content.chars() {
        if c.is_alphanumeric() {
            alnum += 1;
            if c.is_ascii_digit() {
                digits += 1;
            }
        }
    }
    if alnum == 0 {
        return 1.0;
    }
    let ratio = digits as f64 / alnum as f64;
    (ratio * 100.0).round() / 100.0
}
