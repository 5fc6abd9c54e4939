//! Shared types used by the vector store client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A vector's dimension did not match the collection contract.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension (1536).
        expected: usize,
        /// Dimension observed on the offending vector.
        actual: usize,
    },
}

/// A document chunk as stored in (and retrieved from) the vector store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Original chunk identifier (`<doc_id>_chunk_<index>`), preserved across the
    /// UUIDv5 point-id round trip.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Flat metadata map stored alongside the vector.
    pub metadata: Map<String, Value>,
}

/// One similarity hit: the stored document plus its relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matching stored document.
    pub document: StoredDocument,
    /// Cosine similarity score assigned by Qdrant.
    pub score: f32,
}

/// Snapshot of one collection's size and health.
#[derive(Debug, Clone, Default)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Number of points stored.
    pub points_count: u64,
    /// Number of vectors stored.
    pub vectors_count: u64,
    /// Number of vectors covered by the HNSW index.
    pub indexed_vectors_count: u64,
    /// Collection status string reported by Qdrant.
    pub status: String,
    /// Metadata field names sampled from one stored payload.
    pub sample_metadata_fields: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResponse {
    pub(crate) result: ListCollectionsResult,
}

#[derive(Deserialize)]
pub(crate) struct ListCollectionsResult {
    pub(crate) collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionDescription {
    pub(crate) name: String,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfoResult,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResult {
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) points_count: Option<u64>,
    #[serde(default)]
    pub(crate) vectors_count: Option<u64>,
    #[serde(default)]
    pub(crate) indexed_vectors_count: Option<u64>,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub(crate) vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
pub(crate) struct RetrieveResponse {
    #[serde(default)]
    pub(crate) result: Vec<RetrievePoint>,
}

#[derive(Deserialize)]
pub(crate) struct RetrievePoint {
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
    #[serde(default)]
    pub(crate) vector: Option<Vec<f32>>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResponse {
    pub(crate) result: ScrollResult,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    #[serde(default)]
    pub(crate) points: Vec<ScrollPoint>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollPoint {
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
