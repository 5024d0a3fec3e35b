use crate::corpus::Corpus;
use crate::store::Repository;
use anyhow::Result;
use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use url::Url;

/// Damping factor for the authority power iteration.
pub const DAMPING: f64 = 0.9;
/// Convergence threshold, scaled by node count as networkx does.
const TOLERANCE: f64 = 1e-6;
const MAX_ITERATIONS: usize = 100;

static SEL_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Builds the corpus-internal link graph from anchor targets and persists a
/// damped authority score per document URL. Runs after the index exists but
/// depends only on the bookkeeping mapping and raw anchor tags.
pub fn compute_authority(corpus: &Corpus, store: &dyn Repository) -> Result<()> {
    let outgoing = outgoing_links(corpus);
    let ranks = page_rank(&outgoing);
    info!("authority computed over {} nodes", ranks.len());

    let mut urls: Vec<&String> = ranks.keys().collect();
    urls.sort();
    for url in urls {
        if let Err(err) = store.set_authority(url, ranks[url]) {
            warn!("set_authority {url}: {err}");
        }
    }
    Ok(())
}

/// Per-document outgoing links, restricted to targets that resolve to other
/// URLs of the corpus. Duplicate targets collapse; self links are dropped.
fn outgoing_links(corpus: &Corpus) -> Vec<(String, Vec<String>)> {
    let corpus_urls: HashSet<&str> = corpus
        .entries()
        .iter()
        .map(|(_, url)| url.as_str())
        .collect();

    let mut outgoing = Vec::new();
    for (path_id, source_url) in corpus.entries() {
        let raw = match corpus.read_document(path_id) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("skipping {path_id} in link graph: {err}");
                continue;
            }
        };

        let html = Html::parse_document(&raw);
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for anchor in html.select(&SEL_HREF) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(resolved) = normalize_target(source_url, href) else {
                continue;
            };
            if resolved != *source_url
                && corpus_urls.contains(resolved.as_str())
                && seen.insert(resolved.clone())
            {
                targets.push(resolved);
            }
        }
        debug!("{path_id}: {} in-corpus links", targets.len());
        outgoing.push((source_url.clone(), targets));
    }
    outgoing
}

/// Scheme-bearing targets lose their scheme prefix; everything else is
/// resolved against the (scheme-less) source URL with standard URL joining.
fn normalize_target(source_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http") {
        let stripped = href
            .strip_prefix("https://")
            .or_else(|| href.strip_prefix("http://"))
            .unwrap_or(href);
        return Some(stripped.to_string());
    }
    // Corpus URLs carry no scheme, so borrow one for RFC 3986 resolution.
    let base = Url::parse(&format!("http://{source_url}")).ok()?;
    let joined = base.join(href).ok()?;
    let joined = joined.as_str();
    Some(joined.strip_prefix("http://").unwrap_or(joined).to_string())
}

/// Damped power iteration with uniform teleport and dangling-mass
/// redistribution; scores over all nodes sum to 1.
fn page_rank(outgoing: &[(String, Vec<String>)]) -> HashMap<String, f64> {
    let mut graph: DiGraph<(), ()> = DiGraph::new();
    let mut index_to_url: Vec<String> = Vec::new();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
    for (url, targets) in outgoing {
        for node_url in std::iter::once(url).chain(targets.iter()) {
            if !index_of.contains_key(node_url) {
                let idx = graph.add_node(());
                index_of.insert(node_url.clone(), idx);
                index_to_url.push(node_url.clone());
            }
        }
    }
    for (url, targets) in outgoing {
        let from = index_of[url];
        for target in targets {
            graph.add_edge(from, index_of[target], ());
        }
    }

    let n = graph.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let out_degree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.neighbors(idx).count())
        .collect();

    let mut ranks = vec![1.0 / n as f64; n];
    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![0.0f64; n];

        let mut dangling = 0.0;
        for (rank, deg) in ranks.iter().zip(&out_degree) {
            if *deg == 0 {
                dangling += rank;
            }
        }
        let base = (1.0 - DAMPING) / n as f64 + DAMPING * dangling / n as f64;
        for value in next.iter_mut() {
            *value = base;
        }

        for edge in graph.edge_references() {
            let from = edge.source().index();
            let to = edge.target().index();
            next[to] += DAMPING * ranks[from] / out_degree[from] as f64;
        }

        let err: f64 = next
            .iter()
            .zip(&ranks)
            .map(|(a, b)| (a - b).abs())
            .sum();
        ranks = next;
        if err < n as f64 * TOLERANCE {
            break;
        }
    }

    index_to_url
        .into_iter()
        .zip(ranks)
        .collect()
}
