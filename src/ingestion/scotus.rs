//! Supreme Court opinion ingest source.

use async_trait::async_trait;

use crate::apis::court_listener::CourtListenerClient;
use crate::apis::GovernmentApi;
use crate::config::SCOTUS_COLLECTION;
use crate::ingestion::progress::ProgressTracker;
use crate::ingestion::{IngestError, IngestOptions, IngestSource};
use crate::processing::{ChunkPayload, PayloadBuilder};

/// Ingest source for Supreme Court opinions via CourtListener.
///
/// Every opinion is court-validated against its docket before any content fetch;
/// search indexes occasionally surface other courts' opinions under the SCOTUS
/// filter, and those must fail fast without spending embedding calls.
pub struct ScotusIngestSource {
    api: CourtListenerClient,
}

impl ScotusIngestSource {
    /// Build a source around an authenticated CourtListener client.
    pub fn new(api: CourtListenerClient) -> Self {
        Self { api }
    }
}

#[async_trait(?Send)]
impl IngestSource for ScotusIngestSource {
    fn document_type(&self) -> &'static str {
        "scotus"
    }

    fn collection_name(&self) -> &'static str {
        SCOTUS_COLLECTION
    }

    async fn fetch_document_ids(
        &mut self,
        options: &IngestOptions,
        _progress: &ProgressTracker,
    ) -> Result<Vec<String>, IngestError> {
        tracing::info!("Fetching opinion ids from CourtListener clusters API");
        let ids = self
            .api
            .list_document_ids(&options.start_date, &options.end_date, None)
            .await?;
        tracing::info!(opinions = ids.len(), "Fetched opinion ids");
        Ok(ids)
    }

    async fn prepare_document(
        &mut self,
        doc_id: &str,
        builder: &PayloadBuilder,
    ) -> Result<Vec<ChunkPayload>, IngestError> {
        tracing::debug!(id = doc_id, "Validating court");
        self.api.validate_court(doc_id).await?;

        tracing::debug!(id = doc_id, "Fetching opinion");
        let document = self.api.get_document(doc_id).await?;
        tracing::info!(url = %document.url, "Ingesting SCOTUS opinion");

        Ok(builder.build_payloads_from_document(&document).await?)
    }
}
