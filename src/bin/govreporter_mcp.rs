//! MCP server entrypoint (stdio transport).
//!
//! Launches the retrieval server directly, without the CLI wrapper. This mode is
//! meant for editor/agent integrations that spawn one process per session; it
//! shares all runtime configuration with the main binary, and logs only to the
//! log file since stdio carries protocol frames.
use std::sync::Arc;

use anyhow::{Context, Result};
use govreporter::{cli::run_server, config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(config::Config::from_env().context("failed to load configuration")?);
    logging::init_tracing_file_only(config.mcp_log_level.as_deref());

    run_server(config)
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
