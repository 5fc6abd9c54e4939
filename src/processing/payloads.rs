//! Payload assembly: from a [`Document`] to Qdrant-ready chunk payloads.
//!
//! The builder detects the document branch from `(type, source)`, normalizes API
//! metadata into a flat map, runs the branch chunker, asks the LLM extractor for
//! structured fields (falling back to placeholders on failure), and emits one
//! payload per chunk with the merged metadata. The `(type, source)` string sniff
//! tolerates loosely-typed upstream callers; adapters in this crate always emit
//! the canonical spellings.

use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use crate::apis::federal_register::president_name;
use crate::apis::{Document, EO_DOC_TYPE, FEDERAL_REGISTER_SOURCE, SCOTUS_DOC_TYPE};
use crate::processing::chunking::{
    ChunkingConfig, executive_orders::chunk_executive_order, scotus::chunk_supreme_court_opinion,
};
use crate::processing::extraction::{EoLlmFields, MetadataExtractor, ScotusLlmFields};

/// Errors raised while building payloads.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The document carried no text to process.
    #[error("Document {0} has no content to process")]
    EmptyContent(String),
}

/// One chunk ready for embedding and storage.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    /// Chunk identifier: `<doc_id>_chunk_<chunk_index>`.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Embedding vector; empty until the caller fills it.
    pub embedding: Vec<f32>,
    /// Flat merge of document metadata, LLM fields, and chunk metadata.
    pub metadata: Map<String, Value>,
}

/// Builds chunk payloads from documents, owning the extractor and chunking configs.
pub struct PayloadBuilder {
    extractor: Box<dyn MetadataExtractor>,
    scotus_chunking: ChunkingConfig,
    eo_chunking: ChunkingConfig,
}

impl PayloadBuilder {
    /// Construct a builder around a metadata extractor and chunking parameters.
    pub fn new(
        extractor: Box<dyn MetadataExtractor>,
        scotus_chunking: ChunkingConfig,
        eo_chunking: ChunkingConfig,
    ) -> Self {
        Self {
            extractor,
            scotus_chunking,
            eo_chunking,
        }
    }

    /// Transform a document into ordered chunk payloads.
    ///
    /// Returns an empty list (with a warning) for unknown document kinds; empty
    /// content is an error the ingester records as a failure.
    pub async fn build_payloads_from_document(
        &self,
        doc: &Document,
    ) -> Result<Vec<ChunkPayload>, PayloadError> {
        if doc.content.trim().is_empty() {
            return Err(PayloadError::EmptyContent(doc.id.clone()));
        }

        let doc_type_lower = doc.doc_type.to_lowercase();
        let source_lower = doc.source.to_lowercase();

        let is_scotus = doc.doc_type == SCOTUS_DOC_TYPE
            || doc_type_lower.contains("scotus")
            || source_lower.contains("court");
        let is_eo = doc.doc_type == EO_DOC_TYPE
            || doc_type_lower.contains("executive")
            || source_lower.contains("federal");

        if !is_scotus && !is_eo {
            tracing::warn!(
                doc_type = %doc.doc_type,
                source = %doc.source,
                "Unknown document type, skipping"
            );
            return Ok(Vec::new());
        }

        tracing::info!(id = %doc.id, doc_type = %doc.doc_type, "Processing document");

        if is_scotus {
            self.build_scotus_payloads(doc).await
        } else {
            self.build_eo_payloads(doc).await
        }
    }

    async fn build_scotus_payloads(&self, doc: &Document) -> Result<Vec<ChunkPayload>, PayloadError> {
        let mut doc_metadata = normalize_scotus_metadata(doc);

        let (chunks, syllabus) = chunk_supreme_court_opinion(&doc.content, &self.scotus_chunking);
        if chunks.is_empty() {
            tracing::warn!(id = %doc.id, "No chunks generated for document");
            return Ok(Vec::new());
        }

        let llm_fields = match self
            .extractor
            .scotus_fields(&doc.content, syllabus.as_deref())
            .await
        {
            Ok(fields) => fields.to_metadata(),
            Err(error) => {
                tracing::warn!(id = %doc.id, error = %error, "LLM extraction failed, using fallback");
                let mut fields = ScotusLlmFields::fallback().to_metadata();
                fields.insert("llm_extraction_failed".into(), Value::Bool(true));
                fields.insert("requires_reprocessing".into(), Value::Bool(true));
                fields
            }
        };
        doc_metadata.extend(llm_fields);

        Ok(assemble_payloads(doc, &doc_metadata, chunks))
    }

    async fn build_eo_payloads(&self, doc: &Document) -> Result<Vec<ChunkPayload>, PayloadError> {
        let mut doc_metadata = normalize_eo_metadata(doc);

        let chunks = chunk_executive_order(&doc.content, &self.eo_chunking);
        if chunks.is_empty() {
            tracing::warn!(id = %doc.id, "No chunks generated for document");
            return Ok(Vec::new());
        }

        let llm_fields = match self.extractor.eo_fields(&doc.content).await {
            Ok(fields) => fields.to_metadata(),
            Err(error) => {
                tracing::warn!(id = %doc.id, error = %error, "LLM extraction failed, using fallback");
                let mut fields = EoLlmFields::fallback().to_metadata();
                fields.insert("llm_extraction_failed".into(), Value::Bool(true));
                fields.insert("requires_reprocessing".into(), Value::Bool(true));
                fields
            }
        };
        doc_metadata.extend(llm_fields);

        Ok(assemble_payloads(doc, &doc_metadata, chunks))
    }
}

fn assemble_payloads(
    doc: &Document,
    doc_metadata: &Map<String, Value>,
    chunks: Vec<crate::processing::chunking::Chunk>,
) -> Vec<ChunkPayload> {
    let payloads: Vec<ChunkPayload> = chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let chunk_id = format!("{}_chunk_{}", doc.id, chunk_index);
            let mut metadata = doc_metadata.clone();
            metadata.insert("chunk_id".into(), Value::String(chunk_id.clone()));
            metadata.insert("chunk_index".into(), Value::from(chunk_index as u64));
            metadata.insert(
                "section_label".into(),
                Value::String(chunk.section_label.clone()),
            );
            ChunkPayload {
                id: chunk_id,
                text: chunk.text,
                embedding: Vec::new(),
                metadata,
            }
        })
        .collect();

    tracing::info!(id = %doc.id, payloads = payloads.len(), "Generated payloads");
    payloads
}

/// Extract the four-digit year from a `YYYY-MM-DD` date, falling back to the
/// current year when the string does not parse.
pub fn extract_year_from_date(date: &str) -> i32 {
    if date.len() >= 5 {
        let separator = date.as_bytes()[4];
        if separator == b'-' || separator == b'/' {
            if let Ok(year) = date[..4].parse() {
                return year;
            }
        }
    }
    tracing::warn!(date, "Failed to parse date, using current year");
    OffsetDateTime::now_utc().year()
}

fn canonical_source(source: &str) -> String {
    let lowered = source.to_lowercase();
    if lowered == "courtlistener" {
        "CourtListener".to_string()
    } else if lowered == "federal_register" || lowered == "federalregister" {
        FEDERAL_REGISTER_SOURCE.to_string()
    } else {
        source.to_string()
    }
}

fn canonical_doc_type(doc_type: &str) -> String {
    match doc_type.to_lowercase().as_str() {
        "scotus_opinion" => SCOTUS_DOC_TYPE.to_string(),
        "executive_order" => EO_DOC_TYPE.to_string(),
        _ => doc_type.to_string(),
    }
}

/// Map CourtListener opinion-type codes onto schema values.
fn map_opinion_type(code: &str) -> String {
    match code {
        "010combined" | "020lead" => "majority".to_string(),
        "030concurrence" => "concurrence".to_string(),
        "040dissent" => "dissent".to_string(),
        "050concurrence_dissent" => "concurrence_dissent".to_string(),
        other => other.to_string(),
    }
}

/// Normalize Supreme Court opinion metadata into the flat payload schema.
pub fn normalize_scotus_metadata(doc: &Document) -> Map<String, Value> {
    let metadata = &doc.metadata;
    let case_name = metadata
        .get("case_name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(&doc.title)
        .to_string();

    let mut normalized = Map::new();
    normalized.insert("document_id".into(), Value::String(doc.id.clone()));
    normalized.insert("title".into(), Value::String(case_name.clone()));
    normalized.insert("publication_date".into(), Value::String(doc.date.clone()));
    normalized.insert(
        "year".into(),
        Value::from(extract_year_from_date(&doc.date)),
    );
    normalized.insert("source".into(), Value::String(canonical_source(&doc.source)));
    normalized.insert(
        "type".into(),
        Value::String(canonical_doc_type(&doc.doc_type)),
    );
    normalized.insert("url".into(), Value::String(doc.url.clone()));
    normalized.insert("case_name".into(), Value::String(case_name));

    if let Some(code) = metadata.get("type").and_then(Value::as_str) {
        normalized.insert(
            "opinion_type".into(),
            Value::String(map_opinion_type(code)),
        );
    }
    if let Some(citation) = metadata.get("citation") {
        normalized.insert("citation".into(), citation.clone());
    }
    if let Some(docket_number) = metadata.get("docket_number") {
        normalized.insert("docket_number".into(), docket_number.clone());
    }
    if let Some(judges) = metadata.get("judges") {
        normalized.insert("judges".into(), judges.clone());
    }
    normalized.insert(
        "per_curiam".into(),
        metadata
            .get("per_curiam")
            .cloned()
            .unwrap_or(Value::Bool(false)),
    );

    normalized
}

/// Normalize Executive Order metadata into the flat payload schema.
pub fn normalize_eo_metadata(doc: &Document) -> Map<String, Value> {
    let metadata = &doc.metadata;
    let eo_number = metadata
        .get("executive_order_number")
        .or_else(|| metadata.get("presidential_document_number"))
        .cloned()
        .unwrap_or(Value::String(String::new()));

    let mut normalized = Map::new();
    normalized.insert("document_id".into(), Value::String(doc.id.clone()));
    normalized.insert("title".into(), Value::String(doc.title.clone()));
    normalized.insert("publication_date".into(), Value::String(doc.date.clone()));
    normalized.insert(
        "year".into(),
        Value::from(extract_year_from_date(&doc.date)),
    );
    normalized.insert("source".into(), Value::String(canonical_source(&doc.source)));
    normalized.insert(
        "type".into(),
        Value::String(canonical_doc_type(&doc.doc_type)),
    );
    normalized.insert("url".into(), Value::String(doc.url.clone()));
    normalized.insert("eo_number".into(), eo_number.clone());
    normalized.insert("executive_order_number".into(), eo_number);
    normalized.insert(
        "president".into(),
        Value::String(president_name(metadata.get("president"))),
    );
    normalized.insert(
        "agencies".into(),
        metadata
            .get("agencies")
            .cloned()
            .unwrap_or(Value::Array(Vec::new())),
    );
    normalized.insert(
        "signing_date".into(),
        metadata
            .get("signing_date")
            .cloned()
            .unwrap_or(Value::String(doc.date.clone())),
    );
    if let Some(citation) = metadata.get("citation") {
        normalized.insert("citation".into(), citation.clone());
    }

    normalized
}

/// Check that a payload meets the storage contract: non-empty id and text, and
/// string-keyed JSON metadata.
pub fn validate_payload(payload: &ChunkPayload) -> bool {
    !payload.id.is_empty() && !payload.text.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::extraction::{EoLlmFields, ExtractionError, ScotusLlmFields};
    use async_trait::async_trait;
    use serde_json::json;

    struct StubExtractor;

    #[async_trait]
    impl MetadataExtractor for StubExtractor {
        async fn scotus_fields(
            &self,
            _text: &str,
            syllabus: Option<&str>,
        ) -> Result<ScotusLlmFields, ExtractionError> {
            Ok(ScotusLlmFields {
                plain_language_summary: "In a case about digital privacy.".into(),
                holding_plain: syllabus.unwrap_or("no syllabus").to_string(),
                ..ScotusLlmFields::fallback()
            })
        }

        async fn eo_fields(&self, _text: &str) -> Result<EoLlmFields, ExtractionError> {
            Ok(EoLlmFields {
                plain_language_summary: "Creates a new task force.".into(),
                agencies_impacted: vec!["Department of Transportation".into()],
                ..EoLlmFields::fallback()
            })
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl MetadataExtractor for FailingExtractor {
        async fn scotus_fields(
            &self,
            _text: &str,
            _syllabus: Option<&str>,
        ) -> Result<ScotusLlmFields, ExtractionError> {
            Err(ExtractionError::EmptyResponse)
        }

        async fn eo_fields(&self, _text: &str) -> Result<EoLlmFields, ExtractionError> {
            Err(ExtractionError::EmptyResponse)
        }
    }

    fn builder(extractor: Box<dyn MetadataExtractor>) -> PayloadBuilder {
        PayloadBuilder::new(
            extractor,
            ChunkingConfig::scotus_defaults(),
            ChunkingConfig::eo_defaults(),
        )
    }

    fn scotus_document() -> Document {
        let mut metadata = Map::new();
        metadata.insert("case_name".into(), json!("Sample v. Test Case"));
        metadata.insert("type".into(), json!("020lead"));
        metadata.insert("citation".into(), json!("601 U.S. 100 (2024)"));
        Document {
            id: "test_scotus_001".into(),
            title: "fallback title".into(),
            date: "2024-05-16".into(),
            doc_type: SCOTUS_DOC_TYPE.into(),
            source: "CourtListener".into(),
            content: "SYLLABUS\n\nHeld: warrants are required.\n\nJUSTICE ROBERTS delivered the opinion of the Court.\n\nDigital devices deserve protection.".into(),
            url: "https://example.com/opinion".into(),
            metadata,
        }
    }

    fn eo_document() -> Document {
        let mut metadata = Map::new();
        metadata.insert("executive_order_number".into(), json!(14304));
        metadata.insert("president".into(), json!({"name": "Example President"}));
        metadata.insert("signing_date".into(), json!("2025-06-06"));
        Document {
            id: "test_eo_001".into(),
            title: "Test Executive Order".into(),
            date: "2025-06-11".into(),
            doc_type: EO_DOC_TYPE.into(),
            source: "Federal Register".into(),
            content: "By the authority vested in me, I hereby order:\n\nSection 1. Purpose. Testing.\n\nSec. 2. Policy. Agencies shall comply.".into(),
            url: "https://example.com/eo".into(),
            metadata,
        }
    }

    #[tokio::test]
    async fn scotus_payloads_merge_all_metadata_layers() {
        let payloads = builder(Box::new(StubExtractor))
            .build_payloads_from_document(&scotus_document())
            .await
            .expect("payloads");

        assert!(!payloads.is_empty());
        let first = &payloads[0];
        assert_eq!(first.id, "test_scotus_001_chunk_0");
        assert_eq!(first.metadata["case_name"], "Sample v. Test Case");
        assert_eq!(first.metadata["opinion_type"], "majority");
        assert_eq!(first.metadata["year"], 2024);
        assert_eq!(first.metadata["source"], "CourtListener");
        assert_eq!(
            first.metadata["plain_language_summary"],
            "In a case about digital privacy."
        );
        // The syllabus body reached the extractor.
        assert_eq!(first.metadata["holding_plain"], "Held: warrants are required.");
        assert_eq!(first.metadata["chunk_index"], 0);
        assert!(payloads.iter().all(validate_payload));
    }

    #[tokio::test]
    async fn chunk_ids_and_indexes_increase_in_order() {
        let payloads = builder(Box::new(StubExtractor))
            .build_payloads_from_document(&scotus_document())
            .await
            .expect("payloads");
        for (index, payload) in payloads.iter().enumerate() {
            assert_eq!(payload.id, format!("test_scotus_001_chunk_{index}"));
            assert_eq!(payload.metadata["chunk_index"], index as u64);
        }
    }

    #[tokio::test]
    async fn extraction_failure_uses_fallback_and_flags_reprocessing() {
        let payloads = builder(Box::new(FailingExtractor))
            .build_payloads_from_document(&eo_document())
            .await
            .expect("payloads");

        let first = &payloads[0];
        assert_eq!(first.metadata["llm_extraction_failed"], true);
        assert_eq!(first.metadata["requires_reprocessing"], true);
        assert_eq!(
            first.metadata["plain_language_summary"],
            "Unable to generate summary."
        );
    }

    #[tokio::test]
    async fn eo_metadata_aliases_the_order_number() {
        let payloads = builder(Box::new(StubExtractor))
            .build_payloads_from_document(&eo_document())
            .await
            .expect("payloads");
        let first = &payloads[0];
        assert_eq!(first.metadata["eo_number"], 14304);
        assert_eq!(first.metadata["executive_order_number"], 14304);
        assert_eq!(first.metadata["president"], "Example President");
    }

    #[tokio::test]
    async fn legacy_source_spelling_still_routes_to_the_eo_branch() {
        let mut doc = eo_document();
        doc.source = "FederalRegister".into();
        let payloads = builder(Box::new(StubExtractor))
            .build_payloads_from_document(&doc)
            .await
            .expect("payloads");
        assert!(!payloads.is_empty());
        assert_eq!(payloads[0].metadata["source"], "Federal Register");
    }

    #[tokio::test]
    async fn unknown_kinds_return_empty_and_empty_content_errors() {
        let mut unknown = eo_document();
        unknown.doc_type = "Press Release".into();
        unknown.source = "Elsewhere".into();
        let payloads = builder(Box::new(StubExtractor))
            .build_payloads_from_document(&unknown)
            .await
            .expect("unknown type is not an error");
        assert!(payloads.is_empty());

        let mut empty = eo_document();
        empty.content = "   ".into();
        let error = builder(Box::new(StubExtractor))
            .build_payloads_from_document(&empty)
            .await
            .expect_err("empty content must fail");
        assert!(matches!(error, PayloadError::EmptyContent(_)));
    }

    #[test]
    fn year_extraction_handles_malformed_dates() {
        assert_eq!(extract_year_from_date("2024-05-16"), 2024);
        assert_eq!(extract_year_from_date("1999/01/02"), 1999);
        let current = OffsetDateTime::now_utc().year();
        assert_eq!(extract_year_from_date(""), current);
        assert_eq!(extract_year_from_date("not-a-date"), current);
    }
}
