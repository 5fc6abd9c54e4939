//! Government API adapters and the shared document model.
//!
//! Each adapter maps a REST API onto the uniform [`Document`] shape consumed by the
//! processing pipeline, and implements the small [`GovernmentApi`] surface the MCP
//! resource layer relies on. Adapters never retry beyond what the rate-limited HTTP
//! client provides; malformed responses surface as [`ApiError`]s.

pub mod citations;
pub mod court_listener;
pub mod federal_register;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

use crate::http::HttpClientError;

pub use court_listener::CourtListenerClient;
pub use federal_register::FederalRegisterClient;

/// Canonical document type string for Supreme Court opinions.
pub const SCOTUS_DOC_TYPE: &str = "Supreme Court Opinion";
/// Canonical document type string for Executive Orders.
pub const EO_DOC_TYPE: &str = "Executive Order";
/// Canonical source string for CourtListener-backed documents.
pub const COURT_LISTENER_SOURCE: &str = "CourtListener";
/// Canonical source string for Federal Register-backed documents.
pub const FEDERAL_REGISTER_SOURCE: &str = "Federal Register";

/// Errors raised by the government API adapters.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure or retry exhaustion in the HTTP layer.
    #[error(transparent)]
    Http(#[from] HttpClientError),
    /// The API answered with a non-success status the client does not retry.
    #[error("API request failed: {0}")]
    Status(#[from] reqwest::Error),
    /// The response body could not be parsed into the expected shape.
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
    /// A field the pipeline requires was absent from the response.
    #[error("Missing field in API response: {0}")]
    MissingField(&'static str),
    /// A caller-supplied date did not match `YYYY-MM-DD`.
    #[error("Invalid date format: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
    /// An opinion failed court validation against its docket.
    #[error("{0}")]
    WrongCourt(String),
}

/// API-agnostic document record flowing into the payload builder.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable, source-issued identifier.
    pub id: String,
    /// Document title (case name for opinions, order title for EOs).
    pub title: String,
    /// Document date in `YYYY-MM-DD`.
    pub date: String,
    /// Human-readable document type (see [`SCOTUS_DOC_TYPE`], [`EO_DOC_TYPE`]).
    pub doc_type: String,
    /// Source system name (see [`COURT_LISTENER_SOURCE`], [`FEDERAL_REGISTER_SOURCE`]).
    pub source: String,
    /// Full plain text.
    pub content: String,
    /// Canonical web URL.
    pub url: String,
    /// Source-specific metadata fields.
    pub metadata: Map<String, Value>,
}

/// Shared surface the MCP resource layer uses to fetch documents by id.
#[async_trait]
pub trait GovernmentApi: Send + Sync {
    /// Fetch the full document for an identifier.
    async fn get_document(&self, id: &str) -> Result<Document, ApiError>;

    /// Fetch only the plain text content for an identifier.
    async fn get_document_text(&self, id: &str) -> Result<String, ApiError>;
}

/// Check that a date string is exactly `YYYY-MM-DD`.
pub fn validate_date_format(value: &str) -> bool {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = DATE_RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));
    re.is_match(value)
}

/// Read a string field from a JSON object, defaulting to empty.
pub(crate) fn json_str(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_format_accepts_only_iso_dates() {
        assert!(validate_date_format("2024-05-16"));
        assert!(!validate_date_format("2024-5-16"));
        assert!(!validate_date_format("05/16/2024"));
        assert!(!validate_date_format("2024-05-16T00:00:00"));
        assert!(!validate_date_format(""));
    }
}
