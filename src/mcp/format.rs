//! Formatting of retrieval results into LLM-facing markdown.
//!
//! Handlers hand hits to these functions as `(kind, score, payload)` triples where
//! the payload is the flat chunk metadata plus `text`. Chunk excerpts are truncated
//! at 1000 characters; dates stored as Unix seconds render as `Month DD, YYYY`.

use serde_json::{Map, Value};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::apis::Document;
use crate::qdrant::CollectionInfo;

/// Maximum excerpt length before truncation.
const MAX_CHUNK_LENGTH: usize = 1000;

/// Document kind attached to each hit for formatting dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    /// Supreme Court opinion chunk.
    Scotus,
    /// Executive Order chunk.
    ExecutiveOrder,
}

/// One scored hit ready for formatting.
#[derive(Debug, Clone)]
pub struct FormattedHit {
    /// Kind of the underlying document.
    pub kind: HitKind,
    /// Similarity score.
    pub score: f32,
    /// Flat payload: chunk metadata plus `text`.
    pub payload: Map<String, Value>,
}

const ISO_DATE: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");
const HUMAN_DATE: &[FormatItem<'_>] = format_description!("[month repr:long] [day padding:none], [year]");

/// Render a metadata date as `Month DD, YYYY`.
///
/// Accepts Unix seconds (the vector store's native form) or a `YYYY-MM-DD` string;
/// anything else passes through unchanged, and a missing value renders empty.
pub fn format_timestamp_to_date(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
            .and_then(|datetime| datetime.date().format(HUMAN_DATE).ok())
            .unwrap_or_default(),
        Some(Value::String(text)) => match Date::parse(text, ISO_DATE) {
            Ok(date) => date.format(HUMAN_DATE).unwrap_or_else(|_| text.clone()),
            Err(_) => text.clone(),
        },
        _ => String::new(),
    }
}

/// Format mixed search results, most relevant first.
pub fn format_search_results(query: &str, hits: &[FormattedHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for query: '{query}'");
    }

    let mut output = vec![
        "## Government Document Search Results\n".to_string(),
        format!("Query: \"{query}\""),
        format!("Found {} relevant document chunks.\n", hits.len()),
    ];

    for (index, hit) in hits.iter().enumerate() {
        let block = match hit.kind {
            HitKind::Scotus => format_scotus_chunk(index + 1, &hit.payload, hit.score, false),
            HitKind::ExecutiveOrder => format_eo_chunk(index + 1, &hit.payload, hit.score, false),
        };
        output.push(block);
        output.push(String::new());
    }

    if let Some(hint) = full_document_hint(hits) {
        output.push(hint);
    }

    output.join("\n")
}

/// Format SCOTUS-only search results with the detailed legal-context block.
pub fn format_scotus_results(query: &str, hits: &[FormattedHit]) -> String {
    if hits.is_empty() {
        return format!("No Supreme Court opinions found for query: '{query}'");
    }

    let mut output = vec![
        "## Supreme Court Opinion Search Results\n".to_string(),
        format!("Query: \"{query}\""),
        format!("Found {} relevant opinion chunks.\n", hits.len()),
    ];

    for (index, hit) in hits.iter().enumerate() {
        output.push(format_scotus_chunk(index + 1, &hit.payload, hit.score, true));
        output.push(String::new());
    }

    if let Some(hint) = full_document_hint(hits) {
        output.push(hint);
    }

    output.join("\n")
}

/// Format Executive Order search results with the policy-context block.
pub fn format_eo_results(query: &str, hits: &[FormattedHit]) -> String {
    if hits.is_empty() {
        return format!("No Executive Orders found for query: '{query}'");
    }

    let mut output = vec![
        "## Executive Order Search Results\n".to_string(),
        format!("Query: \"{query}\""),
        format!("Found {} relevant order chunks.\n", hits.len()),
    ];

    for (index, hit) in hits.iter().enumerate() {
        output.push(format_eo_chunk(index + 1, &hit.payload, hit.score, true));
        output.push(String::new());
    }

    if let Some(hint) = full_document_hint(hits) {
        output.push(hint);
    }

    output.join("\n")
}

/// Format a single retrieved chunk with its metadata listing.
pub fn format_document_chunk(
    collection: &str,
    document_id: &str,
    payload: &Map<String, Value>,
) -> String {
    let mut output = vec![
        "## Document Retrieved\n".to_string(),
        format!("**Collection:** {collection}"),
        format!("**Document ID:** {document_id}\n"),
    ];

    if collection == crate::config::SCOTUS_COLLECTION {
        output.push(format!("### {}", str_field(payload, "case_name", "Unknown Case")));
    } else if collection == crate::config::EO_COLLECTION {
        output.push(format!("### {}", str_field(payload, "title", "Unknown Order")));
        let eo_number = scalar_field(payload, "executive_order_number");
        if !eo_number.is_empty() {
            output.push(format!("**EO Number:** {eo_number}"));
        }
    }

    output.push("\n### Document Content:".to_string());
    output.push(str_field(payload, "text", "No text available"));

    output.push("\n### Metadata:".to_string());
    for key in [
        "publication_date",
        "signing_date",
        "opinion_type",
        "section_label",
        "citation",
        "president",
        "url",
    ] {
        if let Some(value) = payload.get(key) {
            if !value.is_null() {
                output.push(format!("- **{key}:** {}", scalar_to_display(value)));
            }
        }
    }

    output.join("\n")
}

/// Format a complete document fetched live from its government API.
pub fn format_full_document(
    kind: HitKind,
    document: &Document,
    chunk_metadata: &Map<String, Value>,
) -> String {
    let mut output = vec!["## Full Document Retrieved\n".to_string()];

    match kind {
        HitKind::Scotus => {
            let case_name = document
                .metadata
                .get("case_name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .unwrap_or(&document.title);
            output.push(format!("### {case_name}"));
            let date = format_timestamp_to_date(Some(&Value::String(document.date.clone())));
            if !date.is_empty() {
                output.push(format!("**Date:** {date}"));
            }
            if let Some(opinion_type) = chunk_metadata.get("opinion_type").and_then(Value::as_str) {
                output.push(format!("**Opinion Type:** {}", title_case(opinion_type)));
            }
            output.push("\n### Full Opinion Text:".to_string());
            output.push(if document.content.is_empty() {
                "Full opinion text unavailable.".to_string()
            } else {
                document.content.clone()
            });
        }
        HitKind::ExecutiveOrder => {
            output.push(format!("### {}", document.title));
            let eo_number = document
                .metadata
                .get("executive_order_number")
                .map(scalar_to_display)
                .unwrap_or_default();
            if !eo_number.is_empty() {
                output.push(format!("**EO Number:** {eo_number}"));
            }
            let president = crate::apis::federal_register::president_name(
                document.metadata.get("president"),
            );
            if !president.is_empty() {
                output.push(format!("**President:** {president}"));
            }
            let date = format_timestamp_to_date(Some(&Value::String(document.date.clone())));
            if !date.is_empty() {
                output.push(format!("**Date:** {date}"));
            }
            output.push("\n### Full Order Text:".to_string());
            output.push(if document.content.is_empty() {
                "Full executive order text unavailable.".to_string()
            } else {
                document.content.clone()
            });
        }
    }

    output.join("\n")
}

/// Format the collections listing with per-collection statistics.
pub fn format_collections_list(collections: &[CollectionInfo]) -> String {
    let mut output = vec!["## Available Document Collections\n".to_string()];

    for (index, collection) in collections.iter().enumerate() {
        output.push(format!("### {}. {}", index + 1, collection.name));
        output.push(format!("- **Total Chunks:** {}", collection.points_count));
        output.push(format!("- **Vector Count:** {}", collection.vectors_count));
        output.push(format!(
            "- **Indexed Vectors:** {}",
            collection.indexed_vectors_count
        ));
        output.push(format!("- **Status:** {}", collection.status));
        if !collection.sample_metadata_fields.is_empty() {
            output.push("- **Available Metadata Fields:**".to_string());
            for field in collection.sample_metadata_fields.iter().take(10) {
                output.push(format!("  - {field}"));
            }
        }
        output.push(String::new());
    }

    output.push("### Collection Features:".to_string());
    output.push("- Hierarchical chunking preserves document structure".to_string());
    output.push("- Rich metadata enables advanced filtering".to_string());
    output.push(format!(
        "- Semantic search with {}",
        crate::processing::EMBEDDING_MODEL
    ));
    output.push("- Real-time document retrieval from government APIs".to_string());

    output.join("\n")
}

fn format_scotus_chunk(
    index: usize,
    payload: &Map<String, Value>,
    score: f32,
    detailed: bool,
) -> String {
    let mut lines = Vec::new();

    lines.push(format!("### {index}. {}", str_field(payload, "case_name", "Unknown Case")));

    let citation = str_field(payload, "citation", "");
    if !citation.is_empty() {
        lines.push(format!("*{citation}*"));
    }

    let opinion_type = str_field(payload, "opinion_type", "");
    if !opinion_type.is_empty() {
        let mut header = format!("**{} Opinion**", title_case(&opinion_type));
        let justice = str_field(payload, "justice", "");
        if !justice.is_empty() {
            header.push_str(&format!(" by Justice {justice}"));
        }
        let section = str_field(payload, "section_label", "");
        if !section.is_empty() {
            header.push_str(&format!(" (Section {section})"));
        }
        lines.push(header);
    }

    lines.push("\n**Excerpt:**".to_string());
    lines.push(truncate_chars(
        &str_field(payload, "text", "No text available"),
        MAX_CHUNK_LENGTH,
    ));

    if detailed {
        lines.push("\n**Legal Context:**".to_string());
        if let Some(topics) = string_list(payload, "topics_or_policy_areas") {
            lines.push(format!("- **Topics:** {}", topics.join(", ")));
        }
        if let Some(provisions) = string_list(payload, "constitution_cited") {
            lines.push(format!(
                "- **Constitutional Provisions:** {}",
                provisions.join(", ")
            ));
        }
        if let Some(statutes) = string_list(payload, "federal_statutes_cited") {
            lines.push(format!("- **Statutes:** {}", statutes.join(", ")));
        }
        let vote = str_field(payload, "vote_breakdown", "");
        if !vote.is_empty() {
            lines.push(format!("- **Vote:** {vote}"));
        }
        let holding = str_field(payload, "holding_plain", "");
        if !holding.is_empty() {
            lines.push(format!(
                "- **Key Holding:** {}...",
                truncate_chars(&holding, 200).trim_end_matches("...")
            ));
        }
    }

    lines.push(format!("\n*Relevance Score: {score:.3}*"));
    lines.join("\n")
}

fn format_eo_chunk(
    index: usize,
    payload: &Map<String, Value>,
    score: f32,
    detailed: bool,
) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "### {index}. {}",
        str_field(payload, "title", "Unknown Executive Order")
    ));
    let eo_number = scalar_field(payload, "executive_order_number");
    if !eo_number.is_empty() {
        lines.push(format!("**EO Number:** {eo_number}"));
    }

    let president = str_field(payload, "president", "");
    let signing_date = format_timestamp_to_date(payload.get("signing_date"));
    if !president.is_empty() || !signing_date.is_empty() {
        let mut parts = Vec::new();
        if !president.is_empty() {
            parts.push(format!("President {president}"));
        }
        if !signing_date.is_empty() {
            parts.push(format!("Signed {signing_date}"));
        }
        lines.push(format!("**{}**", parts.join(" | ")));
    }

    let section = str_field(payload, "section_label", "");
    if !section.is_empty() {
        lines.push(format!("\n**{section}**"));
    }

    lines.push("\n**Excerpt:**".to_string());
    lines.push(truncate_chars(
        &str_field(payload, "text", "No text available"),
        MAX_CHUNK_LENGTH,
    ));

    if detailed {
        lines.push("\n**Policy Context:**".to_string());
        let summary = str_field(payload, "plain_language_summary", "");
        if !summary.is_empty() {
            lines.push(format!(
                "- **Summary:** {}...",
                truncate_chars(&summary, 200).trim_end_matches("...")
            ));
        }
        if let Some(topics) = string_list(payload, "topics_or_policy_areas") {
            lines.push(format!("- **Policy Topics:** {}", topics.join(", ")));
        }
        if let Some(agencies) = string_list(payload, "agencies_impacted") {
            lines.push(format!("- **Agencies:** {}", agencies.join(", ")));
        }
    }

    lines.push(format!("\n*Relevance Score: {score:.3}*"));
    lines.join("\n")
}

/// Hint block pointing at full-document retrieval, shown for small, confident
/// result sets whose hits carry a resolvable document id.
fn full_document_hint(hits: &[FormattedHit]) -> Option<String> {
    if hits.is_empty() || hits.len() > 3 {
        return None;
    }
    let best = hits.iter().map(|hit| hit.score).fold(f32::MIN, f32::max);
    if best < 0.4 {
        return None;
    }

    let mut seen = Vec::new();
    let mut invocations = Vec::new();
    for hit in hits {
        let Some(document_id) = hit.payload.get("document_id").and_then(Value::as_str) else {
            continue;
        };
        if seen.contains(&document_id) {
            continue;
        }
        seen.push(document_id);
        let collection = match hit.kind {
            HitKind::Scotus => crate::config::SCOTUS_COLLECTION,
            HitKind::ExecutiveOrder => crate::config::EO_COLLECTION,
        };
        let chunk_id = hit
            .payload
            .get("chunk_id")
            .and_then(Value::as_str)
            .unwrap_or(document_id);
        invocations.push(format!(
            "- get_document_by_id(document_id=\"{chunk_id}\", collection=\"{collection}\", full_document=true)"
        ));
    }

    if invocations.is_empty() {
        return None;
    }

    let mut output = vec![
        "---".to_string(),
        "**Full Document Access**".to_string(),
        "For the complete text, call get_document_by_id with full_document=true:".to_string(),
    ];
    output.extend(invocations);
    Some(output.join("\n"))
}

fn str_field(payload: &Map<String, Value>, key: &str, default: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn scalar_field(payload: &Map<String, Value>, key: &str) -> String {
    payload.get(key).map(scalar_to_display).unwrap_or_default()
}

fn scalar_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_list(payload: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let values: Vec<String> = payload
        .get(key)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if values.is_empty() { None } else { Some(values) }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scotus_hit(score: f32) -> FormattedHit {
        let mut payload = Map::new();
        payload.insert("case_name".into(), json!("Smith v. Jones"));
        payload.insert("citation".into(), json!("601 U.S. 416 (2024)"));
        payload.insert("opinion_type".into(), json!("majority"));
        payload.insert("section_label".into(), json!("Majority Opinion - Part I"));
        payload.insert("text".into(), json!("Held: X."));
        payload.insert("document_id".into(), json!("12345"));
        payload.insert("chunk_id".into(), json!("12345_chunk_0"));
        payload.insert("holding_plain".into(), json!("The person who sued won."));
        payload.insert(
            "topics_or_policy_areas".into(),
            json!(["privacy", "police searches"]),
        );
        FormattedHit {
            kind: HitKind::Scotus,
            score,
            payload,
        }
    }

    fn eo_hit(score: f32) -> FormattedHit {
        let mut payload = Map::new();
        payload.insert("title".into(), json!("Test Order"));
        payload.insert("executive_order_number".into(), json!(14304));
        payload.insert("president".into(), json!("Example President"));
        payload.insert("signing_date".into(), json!(1749168000_i64));
        payload.insert("section_label".into(), json!("Sec. 2 - Policy(a)"));
        payload.insert("text".into(), json!("Agencies shall comply."));
        payload.insert("document_id".into(), json!("2025-10800"));
        FormattedHit {
            kind: HitKind::ExecutiveOrder,
            score,
            payload,
        }
    }

    #[test]
    fn unix_seconds_render_as_long_dates() {
        // 2025-06-06T00:00:00Z
        let formatted = format_timestamp_to_date(Some(&json!(1749168000_i64)));
        assert_eq!(formatted, "June 6, 2025");
    }

    #[test]
    fn iso_strings_render_as_long_dates() {
        let formatted = format_timestamp_to_date(Some(&json!("2024-05-16")));
        assert_eq!(formatted, "May 16, 2024");
        assert_eq!(format_timestamp_to_date(None), "");
    }

    #[test]
    fn scotus_chunk_carries_citation_and_section() {
        let text = format_scotus_chunk(1, &scotus_hit(0.92).payload, 0.92, true);
        assert!(text.contains("### 1. Smith v. Jones"));
        assert!(text.contains("*601 U.S. 416 (2024)*"));
        assert!(text.contains("**Majority Opinion**"));
        assert!(text.contains("(Section Majority Opinion - Part I)"));
        assert!(text.contains("- **Topics:** privacy, police searches"));
        assert!(text.contains("*Relevance Score: 0.920*"));
    }

    #[test]
    fn eo_chunk_formats_header_and_signing_date() {
        let text = format_eo_chunk(2, &eo_hit(0.5).payload, 0.5, false);
        assert!(text.contains("### 2. Test Order"));
        assert!(text.contains("**EO Number:** 14304"));
        assert!(text.contains("President Example President | Signed June 6, 2025"));
        assert!(text.contains("Sec. 2 - Policy(a)"));
    }

    #[test]
    fn long_excerpts_are_truncated_with_ellipsis() {
        let mut hit = eo_hit(0.5);
        hit.payload
            .insert("text".into(), json!("x".repeat(MAX_CHUNK_LENGTH + 50)));
        let text = format_eo_chunk(1, &hit.payload, 0.5, false);
        assert!(text.contains(&format!("{}...", "x".repeat(MAX_CHUNK_LENGTH))));
    }

    #[test]
    fn hint_appears_for_small_confident_result_sets() {
        let hits = vec![scotus_hit(0.92)];
        let text = format_search_results("privacy", &hits);
        assert!(text.contains("Full Document Access"));
        assert!(text.contains(
            "get_document_by_id(document_id=\"12345_chunk_0\", collection=\"supreme_court_opinions\", full_document=true)"
        ));
    }

    #[test]
    fn hint_suppressed_for_large_or_weak_result_sets() {
        let weak = vec![scotus_hit(0.2)];
        assert!(!format_search_results("q", &weak).contains("Full Document Access"));

        let many: Vec<FormattedHit> = (0..4).map(|_| scotus_hit(0.9)).collect();
        assert!(!format_search_results("q", &many).contains("Full Document Access"));
    }

    #[test]
    fn empty_results_say_so() {
        assert!(format_search_results("nothing", &[]).contains("No results found"));
        assert!(format_scotus_results("nothing", &[]).contains("No Supreme Court opinions"));
        assert!(format_eo_results("nothing", &[]).contains("No Executive Orders"));
    }
}
