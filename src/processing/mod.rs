//! Document processing pipeline utilities.
//!
//! The pipeline runs in four stages: structure-aware chunking, token counting,
//! LLM metadata extraction, and embedding generation, with the payload builder
//! orchestrating the first three into storage-ready chunk payloads.

pub mod chunking;
pub mod embeddings;
pub mod extraction;
pub mod payloads;

pub use chunking::{Chunk, ChunkingConfig, count_tokens, normalize_whitespace};
pub use embeddings::{
    EMBEDDING_BATCH_SIZE, EMBEDDING_DIMENSION, EMBEDDING_MODEL, EmbeddingClient, EmbeddingError,
    OpenAiEmbeddingClient,
};
pub use extraction::{
    EoLlmFields, ExtractionError, MetadataExtractor, OpenAiExtractor, ScotusLlmFields,
};
pub use payloads::{ChunkPayload, PayloadBuilder, PayloadError, validate_payload};
