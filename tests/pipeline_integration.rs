//! End-to-end pipeline scenarios exercised through the public API.

use async_trait::async_trait;
use serde_json::json;

use govreporter::apis::Document;
use govreporter::processing::chunking::executive_orders::chunk_executive_order;
use govreporter::processing::chunking::scotus::chunk_supreme_court_opinion;
use govreporter::processing::{
    ChunkingConfig, EoLlmFields, ExtractionError, MetadataExtractor, PayloadBuilder,
    ScotusLlmFields, validate_payload,
};
use govreporter::qdrant::point_id_for;

const OPINION: &str = "SYLLABUS\n\nHeld: X.\n\nJUSTICE ROBERTS delivered the opinion of the Court.\n\n                    I\n\nAlpha.\n\n                    II\n\nBeta.";

const ORDER: &str = "By the authority vested in me as President by the Constitution, I hereby order:\n\nSection 1. Purpose. This order establishes requirements.\n\nSec. 2. Policy. (a) Alpha.\n(b) Beta.\n    (i) Beta-one\n    (ii) Beta-two\n\nSec. 3. Implementation. Agencies shall act within 90 days.";

struct StubExtractor;

#[async_trait]
impl MetadataExtractor for StubExtractor {
    async fn scotus_fields(
        &self,
        _text: &str,
        syllabus: Option<&str>,
    ) -> Result<ScotusLlmFields, ExtractionError> {
        Ok(ScotusLlmFields {
            holding_plain: syllabus.unwrap_or_default().to_string(),
            ..ScotusLlmFields::fallback()
        })
    }

    async fn eo_fields(&self, _text: &str) -> Result<EoLlmFields, ExtractionError> {
        Ok(EoLlmFields::fallback())
    }
}

fn builder() -> PayloadBuilder {
    PayloadBuilder::new(
        Box::new(StubExtractor),
        ChunkingConfig::scotus_defaults(),
        ChunkingConfig::eo_defaults(),
    )
}

#[test]
fn scotus_seed_opinion_yields_labeled_sections_in_order() {
    let (chunks, syllabus) =
        chunk_supreme_court_opinion(OPINION, &ChunkingConfig::scotus_defaults());

    let labels: Vec<&str> = chunks.iter().map(|c| c.section_label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "Syllabus",
            "Majority Opinion - Part I",
            "Majority Opinion - Part II"
        ]
    );
    assert_eq!(syllabus.as_deref(), Some("Held: X."));
}

#[test]
fn eo_seed_order_yields_expected_labels_without_boundary_crossings() {
    let chunks = chunk_executive_order(ORDER, &ChunkingConfig::eo_defaults());
    let labels: Vec<&str> = chunks.iter().map(|c| c.section_label.as_str()).collect();

    for expected in [
        "Preamble",
        "Sec. 1 - Purpose",
        "Sec. 2 - Policy(a)",
        "Sec. 2 - Policy(b)",
        "Sec. 3 - Implementation",
    ] {
        assert!(labels.contains(&expected), "missing label {expected}");
    }

    // Adjacent chunks from different sections must not share overlapping text.
    for pair in chunks.windows(2) {
        if pair[0].section_label != pair[1].section_label {
            assert!(!pair[1].text.starts_with(&pair[0].text));
        }
    }
}

#[tokio::test]
async fn payload_builder_produces_valid_ordered_payloads() {
    let mut metadata = serde_json::Map::new();
    metadata.insert("case_name".into(), json!("Sample v. Test"));
    let document = Document {
        id: "9001".into(),
        title: "Sample v. Test".into(),
        date: "2024-05-16".into(),
        doc_type: "Supreme Court Opinion".into(),
        source: "CourtListener".into(),
        content: OPINION.into(),
        url: "https://example.com".into(),
        metadata,
    };

    let payloads = builder()
        .build_payloads_from_document(&document)
        .await
        .expect("payloads");

    assert_eq!(payloads.len(), 3);
    for (index, payload) in payloads.iter().enumerate() {
        assert!(validate_payload(payload));
        assert_eq!(payload.id, format!("9001_chunk_{index}"));
        assert_eq!(payload.metadata["chunk_index"], index as u64);
    }
    assert_eq!(payloads[0].metadata["holding_plain"], "Held: X.");
}

#[test]
fn point_ids_are_stable_across_runs_and_unique_per_chunk() {
    let first = point_id_for("9001_chunk_0");
    let again = point_id_for("9001_chunk_0");
    let other = point_id_for("9001_chunk_1");
    assert_eq!(first, again);
    assert_ne!(first, other);
}
