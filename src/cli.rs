use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline search engine over a static HTML corpus", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the inverted index and scores for a whole corpus
    Index {
        /// Corpus directory containing bookkeeping.json and the HTML files
        #[arg(long, default_value = "WEBPAGES_RAW")]
        corpus: PathBuf,

        /// Index database path
        #[arg(long, default_value = "index.db")]
        db: PathBuf,

        /// Stopword list, one word per line
        #[arg(long, default_value = "stopwords.txt")]
        stopwords: PathBuf,

        /// Wipe existing index data before building
        #[arg(long)]
        wipe: bool,
    },

    /// Compute link-graph authority scores for an indexed corpus
    Authority {
        #[arg(long, default_value = "WEBPAGES_RAW")]
        corpus: PathBuf,

        #[arg(long, default_value = "index.db")]
        db: PathBuf,
    },

    /// Run a single query and print one result page
    Search {
        /// Free-text query
        query: String,

        /// Offset of the first result to show
        #[arg(long, default_value_t = 0)]
        start: usize,

        #[arg(long, default_value = "index.db")]
        db: PathBuf,

        #[arg(long, default_value = "stopwords.txt")]
        stopwords: PathBuf,
    },

    /// Serve the query engine over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,

        #[arg(long, default_value = "index.db")]
        db: PathBuf,

        #[arg(long, default_value = "stopwords.txt")]
        stopwords: PathBuf,
    },
}
