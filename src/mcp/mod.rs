//! Model Context Protocol server implementation.
//!
//! The server advertises the search tools and document resources over stdio
//! JSON-RPC. All handlers share one [`RetrievalService`], which owns the query
//! embedder, the vector store client, and the government API adapters used for
//! full-document reads.

pub mod format;
pub mod handlers;
mod registry;
pub mod schemas;
pub mod server;

use std::sync::Arc;

use thiserror::Error;

use crate::apis::court_listener::CourtListenerClient;
use crate::apis::federal_register::FederalRegisterClient;
use crate::apis::{ApiError, GovernmentApi};
use crate::config::Config;
use crate::mcp::format::HitKind;
use crate::processing::{EmbeddingClient, EmbeddingError, OpenAiEmbeddingClient};
use crate::qdrant::{StoreError, VectorStore};

pub use server::GovReporterMcpServer;

/// Errors raised while assembling the retrieval service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Vector store client construction failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// API adapter construction failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Shared retrieval dependencies behind the MCP tool and resource handlers.
pub struct RetrievalService {
    config: Arc<Config>,
    embeddings: Box<dyn EmbeddingClient>,
    store: VectorStore,
    court_listener: Option<CourtListenerClient>,
    federal_register: Option<FederalRegisterClient>,
}

impl RetrievalService {
    /// Construct the service from configuration.
    ///
    /// The CourtListener adapter is only available when a token is configured;
    /// SCOTUS resource reads degrade gracefully without it.
    pub fn new(config: Arc<Config>) -> Result<Self, ServiceError> {
        let store = VectorStore::new(&config.qdrant_endpoint(), config.qdrant_api_key.clone())?;
        let embeddings = Box::new(OpenAiEmbeddingClient::new(&config.openai_api_key));
        let court_listener = config
            .court_listener_token
            .as_deref()
            .map(CourtListenerClient::new)
            .transpose()?;
        let federal_register = Some(FederalRegisterClient::new()?);

        Ok(Self {
            config,
            embeddings,
            store,
            court_listener,
            federal_register,
        })
    }

    /// Construct the service from pre-built components (used by tests).
    pub fn with_components(
        config: Arc<Config>,
        embeddings: Box<dyn EmbeddingClient>,
        store: VectorStore,
        court_listener: Option<CourtListenerClient>,
        federal_register: Option<FederalRegisterClient>,
    ) -> Self {
        Self {
            config,
            embeddings,
            store,
            court_listener,
            federal_register,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Vector store client shared by the handlers.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Embed a search query into the corpus vector space.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embeddings.generate_embedding(query).await
    }

    /// API adapter for a document kind, when configured.
    pub fn api_for(&self, kind: HitKind) -> Option<&dyn GovernmentApi> {
        match kind {
            HitKind::Scotus => self
                .court_listener
                .as_ref()
                .map(|client| client as &dyn GovernmentApi),
            HitKind::ExecutiveOrder => self
                .federal_register
                .as_ref()
                .map(|client| client as &dyn GovernmentApi),
        }
    }
}
