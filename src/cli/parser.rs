//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Government Reporter: ingest US federal legal documents into a semantic
/// corpus and serve it to LLMs over MCP.
#[derive(Parser, Debug)]
#[command(name = "govreporter")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest documents for a date range into the vector store.
    Ingest {
        /// Which corpus to ingest.
        #[command(subcommand)]
        target: IngestTarget,
    },

    /// Run the MCP retrieval server over stdio.
    Server,

    /// Run a one-off semantic query against both collections.
    Query {
        /// Natural language query text.
        query: String,

        /// Maximum number of results.
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Inspect collections, samples, and ingestion statistics.
    Info {
        /// What to inspect.
        #[command(subcommand)]
        topic: InfoTopic,
    },
}

/// Ingestion corpus selection.
#[derive(Subcommand, Debug)]
pub enum IngestTarget {
    /// Supreme Court opinions from CourtListener.
    Scotus(IngestArgs),
    /// Executive Orders from the Federal Register.
    Eo(IngestArgs),
    /// Both corpora, SCOTUS first; a SCOTUS failure skips Executive Orders.
    All(IngestArgs),
}

/// Shared ingestion flags.
#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Start date (inclusive), YYYY-MM-DD.
    #[arg(long)]
    pub start_date: String,

    /// End date (inclusive), YYYY-MM-DD; must not precede the start date.
    #[arg(long)]
    pub end_date: String,

    /// Documents per batch (default: 50 for SCOTUS, 25 for Executive Orders).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Path to the SQLite progress database (default: per-corpus file).
    #[arg(long)]
    pub progress_db: Option<PathBuf>,

    /// Qdrant endpoint override (otherwise from QDRANT_URL / QDRANT_HOST).
    #[arg(long)]
    pub qdrant_url: Option<String>,

    /// Process documents without writing to the vector store.
    #[arg(long)]
    pub dry_run: bool,
}

/// Corpus selector for `info sample` and `info stats`.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Corpus {
    /// Supreme Court opinions.
    Scotus,
    /// Executive Orders.
    Eo,
}

/// Topics available under `info`.
#[derive(Subcommand, Debug)]
pub enum InfoTopic {
    /// List vector collections with counts and status.
    Collections,

    /// Show a few stored chunks from a collection.
    Sample {
        /// Corpus to sample.
        #[arg(value_enum)]
        corpus: Corpus,

        /// Number of chunks to show.
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// Show ingestion progress statistics and run history.
    Stats {
        /// Corpus whose progress database to read.
        #[arg(value_enum)]
        corpus: Corpus,

        /// Path to the progress database (default: per-corpus file).
        #[arg(long)]
        progress_db: Option<PathBuf>,
    },
}

impl Corpus {
    /// Progress-tracker document type key.
    pub fn document_type(self) -> &'static str {
        match self {
            Self::Scotus => "scotus",
            Self::Eo => "executive_order",
        }
    }

    /// Vector store collection name.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Scotus => crate::config::SCOTUS_COLLECTION,
            Self::Eo => crate::config::EO_COLLECTION,
        }
    }

    /// Default progress database path.
    pub fn default_progress_db(self) -> PathBuf {
        match self {
            Self::Scotus => PathBuf::from("scotus_ingestion.db"),
            Self::Eo => PathBuf::from("eo_ingestion.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_scotus_parses_required_dates() {
        let cli = Cli::try_parse_from([
            "govreporter",
            "ingest",
            "scotus",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-12-31",
            "--dry-run",
        ])
        .expect("parse");

        match cli.command {
            Commands::Ingest {
                target: IngestTarget::Scotus(args),
            } => {
                assert_eq!(args.start_date, "2024-01-01");
                assert_eq!(args.end_date, "2024-12-31");
                assert!(args.dry_run);
                assert!(args.batch_size.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_dates_are_rejected() {
        assert!(Cli::try_parse_from(["govreporter", "ingest", "eo"]).is_err());
    }

    #[test]
    fn info_sample_accepts_corpus_values() {
        let cli = Cli::try_parse_from(["govreporter", "info", "sample", "eo"]).expect("parse");
        match cli.command {
            Commands::Info {
                topic: InfoTopic::Sample { corpus, limit },
            } => {
                assert!(matches!(corpus, Corpus::Eo));
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
