use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

mod cli;

use cli::{Args, Command};
use quarry::corpus::Corpus;
use quarry::engine::SearchEngine;
use quarry::lexicon::Lexicon;
use quarry::store::SqliteRepository;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Index {
            corpus,
            db,
            stopwords,
            wipe,
        } => {
            let corpus = Corpus::load(&corpus)?;
            let store = SqliteRepository::open(&db)?;
            if wipe {
                store.wipe()?;
            }
            let lexicon = Lexicon::load(Some(stopwords.as_path()));
            quarry::index::build_index(&corpus, &lexicon, &store)?;
        }
        Command::Authority { corpus, db } => {
            let corpus = Corpus::load(&corpus)?;
            let store = SqliteRepository::open(&db)?;
            quarry::authority::compute_authority(&corpus, &store)?;
        }
        Command::Search {
            query,
            start,
            db,
            stopwords,
        } => {
            let store = Arc::new(SqliteRepository::open(&db)?);
            let lexicon = Lexicon::load(Some(stopwords.as_path()));
            let engine = SearchEngine::new(store, lexicon)?;
            let response = engine.search(&query, start);

            println!(
                "{} results ({}s)",
                response.number_results_found, response.query_speed
            );
            for (rank, result) in response.results.iter().enumerate() {
                println!("{}. {}", start + rank + 1, result.url);
                if !result.title.is_empty() {
                    println!("   {}", result.title);
                }
                if !result.snippet.is_empty() {
                    println!("   {}", result.snippet);
                }
            }
        }
        Command::Serve {
            port,
            db,
            stopwords,
        } => {
            let store = Arc::new(SqliteRepository::open(&db)?);
            let lexicon = Lexicon::load(Some(stopwords.as_path()));
            let engine = SearchEngine::new(store, lexicon)?;
            quarry::server::serve(engine, port)?;
        }
    }

    Ok(())
}
