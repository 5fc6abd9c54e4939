//! Handlers for the three semantic search tools.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::config::{EO_COLLECTION, SCOTUS_COLLECTION};
use crate::mcp::RetrievalService;
use crate::mcp::format::{
    FormattedHit, HitKind, format_eo_results, format_scotus_results, format_search_results,
};
use crate::mcp::handlers::{parse_arguments, text_result};
use crate::qdrant::SearchResult;
use crate::qdrant::filters::{and_filter, field_any, field_match, field_range};

/// Arguments for the `search_government_documents` tool.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GovernmentSearchRequest {
    query: String,
    #[serde(default)]
    document_types: Option<Vec<String>>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Arguments for the `search_scotus_opinions` tool.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ScotusSearchRequest {
    query: String,
    #[serde(default)]
    opinion_type: Option<String>,
    #[serde(default)]
    justice: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Arguments for the `search_executive_orders` tool.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EoSearchRequest {
    query: String,
    #[serde(default)]
    president: Option<String>,
    #[serde(default)]
    agencies: Option<Vec<String>>,
    #[serde(default)]
    policy_topics: Option<Vec<String>>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Handle `search_government_documents`: search each requested collection, merge,
/// and sort by score.
pub(crate) async fn handle_search_government_documents(
    service: &Arc<RetrievalService>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: GovernmentSearchRequest = parse_arguments(arguments)?;
    if args.query.trim().is_empty() {
        return Err(McpError::invalid_params("`query` must not be empty", None));
    }
    let limit = effective_limit(service, args.limit);

    let outcome = async {
        let vector = service
            .embed_query(&args.query)
            .await
            .map_err(|err| format!("Error performing search: {err}"))?;

        let requested = args
            .document_types
            .unwrap_or_else(|| vec!["scotus".into(), "executive_orders".into()]);

        let mut hits: Vec<FormattedHit> = Vec::new();
        for document_type in requested {
            let (collection, kind) = match document_type.as_str() {
                "scotus" => (SCOTUS_COLLECTION, HitKind::Scotus),
                "executive_orders" => (EO_COLLECTION, HitKind::ExecutiveOrder),
                other => {
                    tracing::warn!(document_type = other, "Ignoring unknown document type");
                    continue;
                }
            };

            let results = service
                .store()
                .semantic_search(collection, &vector, limit, None, None)
                .await
                .map_err(|err| format!("Error performing search: {err}"))?;
            hits.extend(results.into_iter().map(|result| to_hit(kind, result)));
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);

        Ok(format_search_results(&args.query, &hits))
    }
    .await;

    Ok(text_result(outcome))
}

/// Handle `search_scotus_opinions` with opinion-type/justice/date filters.
pub(crate) async fn handle_search_scotus_opinions(
    service: &Arc<RetrievalService>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: ScotusSearchRequest = parse_arguments(arguments)?;
    if args.query.trim().is_empty() {
        return Err(McpError::invalid_params("`query` must not be empty", None));
    }
    let limit = effective_limit(service, args.limit);

    let outcome = async {
        let vector = service
            .embed_query(&args.query)
            .await
            .map_err(|err| format!("Error performing SCOTUS search: {err}"))?;

        let mut conditions = Vec::new();
        if let Some(opinion_type) = non_empty(args.opinion_type) {
            conditions.push(field_match("opinion_type", json!(opinion_type)));
        }
        if let Some(justice) = non_empty(args.justice) {
            conditions.push(field_match("justice", json!(justice)));
        }
        let start = non_empty(args.start_date);
        let end = non_empty(args.end_date);
        if start.is_some() || end.is_some() {
            conditions.push(field_range(
                "date",
                start.map(|value| json!(value)),
                end.map(|value| json!(value)),
            ));
        }

        let results = service
            .store()
            .semantic_search(
                SCOTUS_COLLECTION,
                &vector,
                limit,
                None,
                and_filter(conditions),
            )
            .await
            .map_err(|err| format!("Error performing SCOTUS search: {err}"))?;

        let hits: Vec<FormattedHit> = results
            .into_iter()
            .map(|result| to_hit(HitKind::Scotus, result))
            .collect();
        Ok(format_scotus_results(&args.query, &hits))
    }
    .await;

    Ok(text_result(outcome))
}

/// Handle `search_executive_orders` with president/agency/topic/date filters.
pub(crate) async fn handle_search_executive_orders(
    service: &Arc<RetrievalService>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: EoSearchRequest = parse_arguments(arguments)?;
    if args.query.trim().is_empty() {
        return Err(McpError::invalid_params("`query` must not be empty", None));
    }
    let limit = effective_limit(service, args.limit);

    let outcome = async {
        let vector = service
            .embed_query(&args.query)
            .await
            .map_err(|err| format!("Error performing Executive Order search: {err}"))?;

        let mut conditions = Vec::new();
        if let Some(president) = non_empty(args.president) {
            conditions.push(field_match("president", json!(president)));
        }
        if let Some(agencies) = non_empty_list(args.agencies) {
            conditions.push(field_any(
                "impacted_agencies",
                agencies.into_iter().map(Value::String).collect(),
            ));
        }
        if let Some(topics) = non_empty_list(args.policy_topics) {
            conditions.push(field_any(
                "policy_topics",
                topics.into_iter().map(Value::String).collect(),
            ));
        }
        let start = non_empty(args.start_date);
        let end = non_empty(args.end_date);
        if start.is_some() || end.is_some() {
            conditions.push(field_range(
                "signing_date",
                start.map(|value| json!(value)),
                end.map(|value| json!(value)),
            ));
        }

        let results = service
            .store()
            .semantic_search(EO_COLLECTION, &vector, limit, None, and_filter(conditions))
            .await
            .map_err(|err| format!("Error performing Executive Order search: {err}"))?;

        let hits: Vec<FormattedHit> = results
            .into_iter()
            .map(|result| to_hit(HitKind::ExecutiveOrder, result))
            .collect();
        Ok(format_eo_results(&args.query, &hits))
    }
    .await;

    Ok(text_result(outcome))
}

/// Flatten a stored document into the formatter's payload shape.
pub(crate) fn to_hit(kind: HitKind, result: SearchResult) -> FormattedHit {
    let mut payload: Map<String, Value> = result.document.metadata;
    payload.insert("text".into(), Value::String(result.document.text));
    FormattedHit {
        kind,
        score: result.score,
        payload,
    }
}

fn effective_limit(service: &RetrievalService, requested: Option<usize>) -> usize {
    let config = service.config();
    requested
        .unwrap_or(config.mcp_default_search_limit)
        .clamp(1, config.mcp_max_search_limit)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn non_empty_list(value: Option<Vec<String>>) -> Option<Vec<String>> {
    let cleaned: Vec<String> = value?
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}
