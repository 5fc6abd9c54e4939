//! Tool handlers for the MCP server.
//!
//! Handler failures never become JSON-RPC errors: every fallible path collapses
//! into a regular text block describing the problem, so hosts always receive a
//! well-formed tool result.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content, JsonObject},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod collections;
pub mod documents;
pub mod search;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Wrap formatted output (or an error description) into a single text block.
pub(crate) fn text_result(outcome: Result<String, String>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(message) => CallToolResult::success(vec![Content::text(message)]),
    }
}
