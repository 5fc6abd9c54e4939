//! Environment-driven configuration for Government Reporter.
//!
//! This module loads and validates settings once at startup (via `Config::from_env`) and the
//! resulting value is threaded through components as an `Arc<Config>`. The configuration powers
//! both the ingestion CLI and the MCP server and includes:
//!
//! - Government API credentials (`COURT_LISTENER_API_TOKEN`, `FEDERAL_REGISTER_API_TOKEN?`).
//! - OpenAI access for embeddings and metadata extraction (`OPENAI_API_KEY`).
//! - Qdrant connectivity (`QDRANT_URL?`, `QDRANT_HOST?`, `QDRANT_PORT?`, `QDRANT_GRPC_PORT?`,
//!   `QDRANT_API_KEY?`).
//! - Chunking overrides (`RAG_SCOTUS_{MIN,TARGET,MAX}_TOKENS`, `RAG_SCOTUS_OVERLAP_RATIO`,
//!   and the `RAG_EO_*` equivalents).
//! - MCP server ergonomics (`MCP_SERVER_NAME?`, `MCP_SERVER_VERSION?`,
//!   `MCP_DEFAULT_SEARCH_LIMIT?`, `MCP_MAX_SEARCH_LIMIT?`, `MCP_ENABLE_CACHE?`,
//!   `MCP_LOG_LEVEL?`).
//!
//! Most fields are optional with sensible defaults; invalid combinations are flagged early with
//! descriptive errors so misconfiguration is easy to diagnose.

use std::env;

use thiserror::Error;

use crate::processing::chunking::{ChunkingConfig, ChunkingConfigError};

/// Qdrant collection holding Supreme Court opinion chunks.
pub const SCOTUS_COLLECTION: &str = "supreme_court_opinions";
/// Qdrant collection holding Executive Order chunks.
pub const EO_COLLECTION: &str = "executive_orders";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Chunking parameters violated their invariants.
    #[error("Invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingConfigError),
}

/// Runtime configuration shared by the ingestion pipeline and the MCP server.
#[derive(Debug, Clone)]
pub struct Config {
    /// CourtListener API token (required for SCOTUS ingestion).
    pub court_listener_token: Option<String>,
    /// Federal Register API token (optional; the API works unauthenticated).
    pub federal_register_token: Option<String>,
    /// OpenAI API key used for embeddings and LLM metadata extraction.
    pub openai_api_key: String,
    /// Legacy Gemini key, accepted for compatibility but unused.
    pub gemini_api_key: Option<String>,
    /// Explicit Qdrant base URL; takes priority over host/port.
    pub qdrant_url: Option<String>,
    /// Qdrant host used when no URL is given.
    pub qdrant_host: Option<String>,
    /// Qdrant REST port used with `qdrant_host`.
    pub qdrant_port: Option<u16>,
    /// Qdrant gRPC port; accepted and validated but unused by the REST transport.
    pub qdrant_grpc_port: Option<u16>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Chunking parameters for Supreme Court opinions.
    pub scotus_chunking: ChunkingConfig,
    /// Chunking parameters for Executive Orders.
    pub eo_chunking: ChunkingConfig,
    /// Name the MCP server advertises to hosts.
    pub mcp_server_name: String,
    /// Version string the MCP server advertises to hosts.
    pub mcp_server_version: String,
    /// Default number of results returned by search tools when callers omit `limit`.
    pub mcp_default_search_limit: usize,
    /// Maximum number of results allowed per search tool call.
    pub mcp_max_search_limit: usize,
    /// Whether MCP handlers may cache API-backed resource reads.
    pub mcp_enable_cache: bool,
    /// Optional log-level override for the MCP server binary.
    pub mcp_log_level: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mcp_default_search_limit = load_usize_with_default("MCP_DEFAULT_SEARCH_LIMIT", 10)?;
        let mcp_max_search_limit = load_usize_with_default("MCP_MAX_SEARCH_LIMIT", 50)?;

        if mcp_default_search_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "MCP_DEFAULT_SEARCH_LIMIT must be at least 1".into(),
            ));
        }
        if mcp_default_search_limit > mcp_max_search_limit {
            return Err(ConfigError::InvalidValue(
                "MCP_DEFAULT_SEARCH_LIMIT cannot exceed MCP_MAX_SEARCH_LIMIT".into(),
            ));
        }

        Ok(Self {
            court_listener_token: load_env_optional("COURT_LISTENER_API_TOKEN"),
            federal_register_token: load_env_optional("FEDERAL_REGISTER_API_TOKEN"),
            openai_api_key: load_env("OPENAI_API_KEY")?,
            gemini_api_key: load_env_optional("GOOGLE_GEMINI_API_KEY"),
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_host: load_env_optional("QDRANT_HOST"),
            qdrant_port: load_port_optional("QDRANT_PORT")?,
            qdrant_grpc_port: load_port_optional("QDRANT_GRPC_PORT")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            scotus_chunking: ChunkingConfig::scotus_from_env()?,
            eo_chunking: ChunkingConfig::eo_from_env()?,
            mcp_server_name: load_env_optional("MCP_SERVER_NAME")
                .unwrap_or_else(|| "govreporter".to_string()),
            mcp_server_version: load_env_optional("MCP_SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            mcp_default_search_limit,
            mcp_max_search_limit,
            mcp_enable_cache: load_bool_with_default("MCP_ENABLE_CACHE", false)?,
            mcp_log_level: load_env_optional("MCP_LOG_LEVEL"),
        })
    }

    /// Resolve the Qdrant REST endpoint: explicit URL, then host/port, then localhost.
    pub fn qdrant_endpoint(&self) -> String {
        if let Some(url) = &self.qdrant_url {
            return url.clone();
        }
        if let Some(host) = &self.qdrant_host {
            let port = self.qdrant_port.unwrap_or(6333);
            return format!("http://{host}:{port}");
        }
        "http://localhost:6333".to_string()
    }

    /// Return the CourtListener token, failing with a descriptive error when absent.
    pub fn require_court_listener_token(&self) -> Result<&str, ConfigError> {
        self.court_listener_token
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable("COURT_LISTENER_API_TOKEN".to_string()))
    }

    /// Map a document-type key (`scotus`, `executive_orders`) to its collection name.
    pub fn collection_for(document_type: &str) -> Option<&'static str> {
        match document_type {
            "scotus" => Some(SCOTUS_COLLECTION),
            "executive_orders" => Some(EO_COLLECTION),
            _ => None,
        }
    }
}

/// Load `.env` and read configuration, for use from process entry points.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_endpoint = %config.qdrant_endpoint(),
        mcp_server_name = %config.mcp_server_name,
        mcp_default_search_limit = config.mcp_default_search_limit,
        mcp_max_search_limit = config.mcp_max_search_limit,
        "Loaded configuration"
    );
    Ok(config)
}

fn load_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn load_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        Some(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
        None => Ok(default),
    }
}

fn load_port_optional(key: &str) -> Result<Option<u16>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::processing::chunking::ChunkingConfig;

    pub(crate) fn test_config() -> Config {
        Config {
            court_listener_token: Some("test-token".into()),
            federal_register_token: None,
            openai_api_key: "sk-test".into(),
            gemini_api_key: None,
            qdrant_url: None,
            qdrant_host: None,
            qdrant_port: None,
            qdrant_grpc_port: None,
            qdrant_api_key: None,
            scotus_chunking: ChunkingConfig::scotus_defaults(),
            eo_chunking: ChunkingConfig::eo_defaults(),
            mcp_server_name: "govreporter".into(),
            mcp_server_version: "0.1.0".into(),
            mcp_default_search_limit: 10,
            mcp_max_search_limit: 50,
            mcp_enable_cache: false,
            mcp_log_level: None,
        }
    }

    #[test]
    fn endpoint_prefers_explicit_url() {
        let mut config = test_config();
        config.qdrant_url = Some("http://qdrant.internal:7000".into());
        config.qdrant_host = Some("ignored".into());
        assert_eq!(config.qdrant_endpoint(), "http://qdrant.internal:7000");
    }

    #[test]
    fn endpoint_falls_back_to_host_and_port() {
        let mut config = test_config();
        config.qdrant_host = Some("10.0.0.5".into());
        config.qdrant_port = Some(6400);
        assert_eq!(config.qdrant_endpoint(), "http://10.0.0.5:6400");
    }

    #[test]
    fn endpoint_defaults_to_localhost() {
        assert_eq!(test_config().qdrant_endpoint(), "http://localhost:6333");
    }

    #[test]
    fn collection_map_covers_both_types() {
        assert_eq!(Config::collection_for("scotus"), Some(SCOTUS_COLLECTION));
        assert_eq!(Config::collection_for("executive_orders"), Some(EO_COLLECTION));
        assert_eq!(Config::collection_for("unknown"), None);
    }
}
