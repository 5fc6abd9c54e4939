//! Qdrant vector store integration.
//!
//! Points carry deterministic UUIDv5 ids derived from their original chunk ids, so
//! re-ingesting a document upserts in place instead of duplicating, and the original
//! string id survives the round trip in the payload.

pub mod client;
pub mod filters;
mod payload;
pub mod types;

pub use client::{UPSERT_BATCH_SIZE, VectorStore};
pub use payload::point_id_for;
pub use types::{CollectionInfo, SearchResult, StoreError, StoredDocument};
