//! Handler for collection discovery.

use std::sync::Arc;

use rmcp::{ErrorData as McpError, model::CallToolResult};

use crate::mcp::RetrievalService;
use crate::mcp::format::format_collections_list;
use crate::mcp::handlers::text_result;

/// Handle `list_collections`: enumerate collections with counts, status, and a
/// sample-derived preview of metadata fields.
pub(crate) async fn handle_list_collections(
    service: &Arc<RetrievalService>,
) -> Result<CallToolResult, McpError> {
    let outcome = async {
        let names = service
            .store()
            .list_collections()
            .await
            .map_err(|err| format!("Error listing collections: {err}"))?;

        let mut collections = Vec::with_capacity(names.len());
        for name in names {
            match service.store().get_collection_info(&name).await {
                Ok(info) => collections.push(info),
                Err(error) => {
                    tracing::warn!(collection = %name, error = %error, "Skipping collection info");
                }
            }
        }

        Ok(format_collections_list(&collections))
    }
    .await;

    Ok(text_result(outcome))
}
