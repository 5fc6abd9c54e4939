//! Point identity and payload construction for the vector store.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::StoredDocument;

/// Payload key carrying the chunk text.
pub(crate) const TEXT_KEY: &str = "text";
/// Payload key preserving the original string id across the UUIDv5 mapping.
pub(crate) const ORIGINAL_ID_KEY: &str = "original_id";

/// Derive the deterministic point id for an original chunk id.
///
/// UUIDv5 in the DNS namespace over the id bytes: the same `<doc_id>_chunk_<index>`
/// always maps to the same point, which is what makes re-ingestion idempotent.
pub fn point_id_for(original_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, original_id.as_bytes())
}

/// Build the payload object stored alongside a point: the flat metadata plus the
/// chunk text and the original id.
pub(crate) fn build_point_payload(document: &StoredDocument) -> Map<String, Value> {
    let mut payload = document.metadata.clone();
    payload.insert(TEXT_KEY.into(), Value::String(document.text.clone()));
    payload.insert(ORIGINAL_ID_KEY.into(), Value::String(document.id.clone()));
    payload
}

/// Rebuild a [`StoredDocument`] from a retrieved payload and vector.
pub(crate) fn document_from_payload(
    mut payload: Map<String, Value>,
    vector: Option<Vec<f32>>,
) -> StoredDocument {
    let id = payload
        .remove(ORIGINAL_ID_KEY)
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    let text = payload
        .remove(TEXT_KEY)
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();

    StoredDocument {
        id,
        text,
        embedding: vector.unwrap_or_default(),
        metadata: payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_ids_are_deterministic_and_distinct() {
        let a1 = point_id_for("12345_chunk_0");
        let a2 = point_id_for("12345_chunk_0");
        let b = point_id_for("12345_chunk_1");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn payload_round_trip_preserves_id_text_and_metadata() {
        let mut metadata = Map::new();
        metadata.insert("case_name".into(), json!("Smith v. Jones"));
        let document = StoredDocument {
            id: "12345_chunk_0".into(),
            text: "Held: X.".into(),
            embedding: vec![0.5, 0.5],
            metadata,
        };

        let payload = build_point_payload(&document);
        assert_eq!(payload["original_id"], "12345_chunk_0");
        assert_eq!(payload["text"], "Held: X.");

        let restored = document_from_payload(payload, Some(vec![0.5, 0.5]));
        assert_eq!(restored.id, document.id);
        assert_eq!(restored.text, document.text);
        assert_eq!(restored.metadata["case_name"], "Smith v. Jones");
        assert!(!restored.metadata.contains_key("original_id"));
    }
}
