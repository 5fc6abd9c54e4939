use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use govreporter::cli::{Cli, Commands, run_info, run_ingest, run_query, run_server};
use govreporter::{config, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // The server subcommand shares stdout with the MCP transport; everything it
    // logs must go to the log file instead.
    match &cli.command {
        Commands::Server => logging::init_tracing_file_only(None),
        _ => logging::init_tracing(cli.verbose),
    }

    let config = match config::load_config() {
        Ok(config) => Arc::new(config),
        Err(error) => {
            eprintln!("Configuration error: {error}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Commands::Ingest { target } => run_ingest(target, &config).await,
        Commands::Server => run_server(config).await,
        Commands::Query { query, limit } => run_query(config, query, *limit).await,
        Commands::Info { topic } => run_info(topic, &config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_interrupted() => {
            eprintln!("Interrupted.");
            ExitCode::from(130)
        }
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::from(1)
        }
    }
}
