//! Handler for chunk retrieval and optional full-document fetch.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::{EO_COLLECTION, SCOTUS_COLLECTION};
use crate::mcp::RetrievalService;
use crate::mcp::format::{HitKind, format_document_chunk, format_full_document};
use crate::mcp::handlers::{parse_arguments, text_result};

/// Arguments for the `get_document_by_id` tool.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GetDocumentRequest {
    document_id: String,
    collection: String,
    #[serde(default)]
    full_document: bool,
}

/// Handle `get_document_by_id`: fetch a chunk, and when requested, the complete
/// source document from the matching government API.
pub(crate) async fn handle_get_document_by_id(
    service: &Arc<RetrievalService>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: GetDocumentRequest = parse_arguments(arguments)?;

    let kind = match args.collection.as_str() {
        SCOTUS_COLLECTION => HitKind::Scotus,
        EO_COLLECTION => HitKind::ExecutiveOrder,
        other => {
            return Err(McpError::invalid_params(
                format!("Unknown collection: {other}"),
                None,
            ));
        }
    };

    let outcome = async {
        let stored = service
            .store()
            .get_document(&args.collection, &args.document_id)
            .await
            .map_err(|err| format!("Error retrieving document: {err}"))?;

        let Some(stored) = stored else {
            return Ok(format!(
                "Document '{}' not found in collection '{}'.",
                args.document_id, args.collection
            ));
        };

        let mut payload: Map<String, Value> = stored.metadata.clone();
        payload.insert("text".into(), Value::String(stored.text.clone()));

        let mut output = format_document_chunk(&args.collection, &args.document_id, &payload);

        if args.full_document {
            let source_id = source_document_id(&payload, &args.document_id);
            match service.api_for(kind) {
                Some(api) => match api.get_document(&source_id).await {
                    Ok(document) => {
                        output.push_str("\n\n");
                        output.push_str(&format_full_document(kind, &document, &payload));
                    }
                    Err(error) => {
                        output.push_str(&format!(
                            "\n\n*Full document unavailable: {error}*"
                        ));
                    }
                },
                None => {
                    output.push_str(
                        "\n\n*Full document unavailable: source API is not configured.*",
                    );
                }
            }
        }

        Ok(output)
    }
    .await;

    Ok(text_result(outcome))
}

/// Resolve the source document id behind a chunk: the stored `document_id` field
/// when present, else the chunk id with its `_chunk_<n>` suffix stripped.
pub(crate) fn source_document_id(payload: &Map<String, Value>, chunk_id: &str) -> String {
    if let Some(document_id) = payload.get("document_id").and_then(Value::as_str) {
        if !document_id.is_empty() {
            return document_id.to_string();
        }
    }
    match chunk_id.rsplit_once("_chunk_") {
        Some((document_id, _)) => document_id.to_string(),
        None => chunk_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn source_id_prefers_the_stored_field() {
        let mut payload = Map::new();
        payload.insert("document_id".into(), json!("12345"));
        assert_eq!(source_document_id(&payload, "12345_chunk_3"), "12345");
    }

    #[test]
    fn source_id_falls_back_to_suffix_stripping() {
        let payload = Map::new();
        assert_eq!(source_document_id(&payload, "2025-10800_chunk_7"), "2025-10800");
        assert_eq!(source_document_id(&payload, "bare-id"), "bare-id");
    }
}
