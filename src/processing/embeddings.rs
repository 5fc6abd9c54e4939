//! Embedding generation for chunk text and search queries.
//!
//! Vectors are fixed at 1536 dimensions (`text-embedding-3-small`). Batch generation
//! slices inputs into batches of 20 with one API call each; a failed batch falls back
//! to per-item calls, and an item that still fails gets a zero vector in its slot so
//! chunk order is always preserved.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Embedding model used for both chunks and queries.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Dimensionality of every vector in the corpus.
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Number of texts sent per batch API call.
pub const EMBEDDING_BATCH_SIZE: usize = 20;

const MAX_ATTEMPTS: u32 = 3;
const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Errors raised by the embedding generator.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embeddings API failed after retries.
    #[error("OpenAI embeddings request failed: {0}")]
    Api(#[from] OpenAIError),
    /// The API returned a different number of vectors than inputs.
    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch {
        /// Number of input texts.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce a 1536-dimension vector for one text, retrying transient failures.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Produce one vector per input text, preserving order.
    ///
    /// Individual failures degrade to zero vectors rather than aborting the batch.
    async fn generate_batch_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Embedding client backed by the OpenAI embeddings API.
pub struct OpenAiEmbeddingClient {
    client: Client<OpenAIConfig>,
}

impl OpenAiEmbeddingClient {
    /// Construct a client authenticated with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
        }
    }

    async fn embed_once(&self, input: EmbeddingInput) -> Result<Vec<Vec<f32>>, OpenAIError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(EMBEDDING_MODEL)
            .input(input)
            .build()?;
        let response = self.client.embeddings().create(request).await?;
        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }

    /// One input with three attempts and 1s/2s/4s backoff.
    async fn embed_with_retries(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self
                .embed_once(EmbeddingInput::String(text.to_string()))
                .await
            {
                Ok(mut vectors) if !vectors.is_empty() => return Ok(vectors.swap_remove(0)),
                Ok(_) => {
                    return Err(EmbeddingError::CountMismatch {
                        expected: 1,
                        actual: 0,
                    });
                }
                Err(error) if attempt < MAX_ATTEMPTS => {
                    let wait = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        wait_s = wait.as_secs(),
                        error = %error,
                        "Embedding attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_retries(text).await
    }

    async fn generate_batch_embeddings(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for (batch_index, batch) in texts.chunks(EMBEDDING_BATCH_SIZE).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }

            match self
                .embed_once(EmbeddingInput::StringArray(batch.to_vec()))
                .await
            {
                Ok(vectors) if vectors.len() == batch.len() => embeddings.extend(vectors),
                Ok(vectors) => {
                    return Err(EmbeddingError::CountMismatch {
                        expected: batch.len(),
                        actual: vectors.len(),
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        batch_index,
                        size = batch.len(),
                        error = %error,
                        "Batch embedding failed, falling back to per-item calls"
                    );
                    for text in batch {
                        match self.embed_with_retries(text).await {
                            Ok(vector) => embeddings.push(vector),
                            Err(error) => {
                                tracing::error!(
                                    error = %error,
                                    "Single embedding failed, emitting zero vector"
                                );
                                embeddings.push(vec![0.0; EMBEDDING_DIMENSION]);
                            }
                        }
                    }
                }
            }
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_and_dimension_match_the_corpus_contract() {
        assert_eq!(EMBEDDING_DIMENSION, 1536);
        assert_eq!(EMBEDDING_BATCH_SIZE, 20);
    }
}
