//! Command-line interface: argument parsing and command dispatch.

pub mod commands;
pub mod parser;

pub use commands::{CommandError, run_info, run_ingest, run_query, run_server};
pub use parser::{Cli, Commands, Corpus, IngestArgs, IngestTarget, InfoTopic};
