//! Batch ingestion pipeline.
//!
//! The [`Ingester`] owns the shared services (payload builder, embedder, vector
//! store, progress tracker, monitor) and drives the run loop; an [`IngestSource`]
//! supplies the document-type specifics: where ids come from and how one document
//! becomes payloads. Per-document failures are recorded and skipped; batch upsert
//! failures are logged and the run continues; an interrupt ends the run cleanly and
//! leaves `processing` rows for the next start to reset.

pub mod executive_orders;
pub mod monitoring;
pub mod progress;
pub mod scotus;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::apis::ApiError;
use crate::processing::{
    ChunkPayload, EmbeddingClient, EmbeddingError, PayloadBuilder, PayloadError,
};
use crate::qdrant::{StoreError, StoredDocument, UPSERT_BATCH_SIZE, VectorStore};

pub use executive_orders::EoIngestSource;
pub use monitoring::{PerformanceMonitor, PerformanceStats, format_duration};
pub use progress::{ProgressError, ProgressStatistics, ProgressTracker};
pub use scotus::ScotusIngestSource;

/// Errors raised by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Government API failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Payload construction failure.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Embedding generation failure.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Progress database failure (fatal for the run).
    #[error(transparent)]
    Progress(#[from] ProgressError),
    /// A document produced no usable payloads or content.
    #[error("{0}")]
    Document(String),
    /// The run was interrupted by the user.
    #[error("Ingestion interrupted")]
    Interrupted,
}

/// Date range and batching options for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Start of the date range (`YYYY-MM-DD`).
    pub start_date: String,
    /// End of the date range (`YYYY-MM-DD`).
    pub end_date: String,
    /// Documents processed per batch before a vector store upsert.
    pub batch_size: usize,
    /// When set, skip all vector store writes.
    pub dry_run: bool,
}

/// Document-type specifics plugged into the shared run loop.
#[async_trait(?Send)]
pub trait IngestSource: Send {
    /// Progress-tracker document type key (e.g. `"scotus"`).
    fn document_type(&self) -> &'static str;

    /// Target vector store collection.
    fn collection_name(&self) -> &'static str;

    /// List the document ids in the run's date range. Implementations may record
    /// per-document metadata on the tracker while listing.
    async fn fetch_document_ids(
        &mut self,
        options: &IngestOptions,
        progress: &ProgressTracker,
    ) -> Result<Vec<String>, IngestError>;

    /// Fetch and transform one document into chunk payloads (without embeddings).
    async fn prepare_document(
        &mut self,
        doc_id: &str,
        builder: &PayloadBuilder,
    ) -> Result<Vec<ChunkPayload>, IngestError>;
}

/// Drives the ingestion template: list, filter, batch-process, embed, upsert, report.
pub struct Ingester<S: IngestSource> {
    source: S,
    builder: PayloadBuilder,
    embeddings: Box<dyn EmbeddingClient>,
    store: Arc<VectorStore>,
    progress: ProgressTracker,
    monitor: PerformanceMonitor,
    options: IngestOptions,
    shutdown: Arc<AtomicBool>,
}

impl<S: IngestSource> Ingester<S> {
    /// Assemble an ingester around its source and shared services.
    ///
    /// The `shutdown` flag is polled between documents; setting it finishes the run
    /// cleanly without starting new work.
    pub fn new(
        source: S,
        builder: PayloadBuilder,
        embeddings: Box<dyn EmbeddingClient>,
        store: Arc<VectorStore>,
        progress: ProgressTracker,
        options: IngestOptions,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            builder,
            embeddings,
            store,
            progress,
            monitor: PerformanceMonitor::new(),
            options,
            shutdown,
        }
    }

    /// Execute the ingestion run.
    pub async fn run(&mut self) -> Result<(), IngestError> {
        tracing::info!(
            start = %self.options.start_date,
            end = %self.options.end_date,
            document_type = self.source.document_type(),
            "Starting ingestion"
        );
        if self.options.dry_run {
            tracing::info!("DRY RUN MODE - no documents will be stored");
        }

        self.progress.reset_processing_status()?;
        let run_id = self.progress.start_run(
            &self.options.start_date,
            &self.options.end_date,
            &json!({
                "batch_size": self.options.batch_size,
                "dry_run": self.options.dry_run,
            }),
        )?;

        let outcome = self.run_inner().await;

        self.progress.end_run(run_id)?;
        match outcome {
            Ok(()) => {
                self.print_final_statistics().await;
                Ok(())
            }
            Err(IngestError::Interrupted) => {
                tracing::warn!("Run interrupted; progress saved for resume");
                Err(IngestError::Interrupted)
            }
            Err(error) => Err(error),
        }
    }

    async fn run_inner(&mut self) -> Result<(), IngestError> {
        let ids = self
            .source
            .fetch_document_ids(&self.options, &self.progress)
            .await?;

        if ids.is_empty() {
            tracing::warn!("No documents found in the specified date range");
            return Ok(());
        }
        tracing::info!(total = ids.len(), "Found documents");

        for id in &ids {
            self.progress.add_document(id, None)?;
        }

        let pending = self.progress.get_pending_documents(None)?;
        if pending.is_empty() {
            tracing::info!("All documents have already been processed");
            return Ok(());
        }
        tracing::info!(pending = pending.len(), "Processing pending documents");

        self.monitor.start();
        let total = pending.len() as u64;
        let mut processed: u64 = 0;

        for (batch_index, batch) in pending.chunks(self.options.batch_size.max(1)).enumerate() {
            tracing::info!(batch = batch_index + 1, size = batch.len(), "Processing batch");
            let mut batch_documents: Vec<StoredDocument> = Vec::new();

            for doc_id in batch {
                if self.shutdown.load(Ordering::Relaxed) {
                    return Err(IngestError::Interrupted);
                }

                processed += 1;
                self.monitor
                    .print_progress(processed, total, "Processing documents");

                let started = Instant::now();
                let ok = self.process_single_document(doc_id, &mut batch_documents).await?;
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.monitor.record_document(Some(elapsed_ms), !ok);
            }

            if !batch_documents.is_empty() && !self.options.dry_run {
                self.store_batch(&batch_documents).await;
            }
        }

        Ok(())
    }

    /// Process one document end to end, appending its chunks to the batch.
    ///
    /// Returns `Ok(false)` when the document failed and was recorded; only progress
    /// database errors abort the run.
    async fn process_single_document(
        &mut self,
        doc_id: &str,
        batch_documents: &mut Vec<StoredDocument>,
    ) -> Result<bool, ProgressError> {
        let started = Instant::now();
        self.progress.mark_processing(doc_id)?;

        let payloads = match self.source.prepare_document(doc_id, &self.builder).await {
            Ok(payloads) if payloads.is_empty() => {
                let message = format!("No payloads generated for document {doc_id}");
                tracing::warn!(id = doc_id, "{message}");
                self.progress.mark_failed(doc_id, &message)?;
                return Ok(false);
            }
            Ok(payloads) => payloads,
            Err(error) => {
                tracing::error!(id = doc_id, error = %error, "Error processing document");
                self.progress.mark_failed(doc_id, &error.to_string())?;
                return Ok(false);
            }
        };

        let texts: Vec<String> = payloads.iter().map(|p| p.text.clone()).collect();
        let embeddings = match self.embeddings.generate_batch_embeddings(&texts).await {
            Ok(embeddings) => embeddings,
            Err(error) => {
                tracing::error!(id = doc_id, error = %error, "Embedding generation failed");
                self.progress.mark_failed(doc_id, &error.to_string())?;
                return Ok(false);
            }
        };

        let ingested_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        for (payload, embedding) in payloads.into_iter().zip(embeddings) {
            let mut metadata = payload.metadata;
            metadata.insert("document_id".into(), serde_json::Value::String(doc_id.to_string()));
            metadata.insert(
                "ingested_at".into(),
                serde_json::Value::String(ingested_at.clone()),
            );
            batch_documents.push(StoredDocument {
                id: payload.id,
                text: payload.text,
                embedding,
                metadata,
            });
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        self.progress.mark_completed(doc_id, Some(elapsed_ms))?;
        Ok(true)
    }

    /// Upsert a finished batch; failures are logged and the run continues. Documents
    /// in a failed batch stay `completed` in the progress store, a known trade-off.
    async fn store_batch(&self, batch_documents: &[StoredDocument]) {
        tracing::info!(chunks = batch_documents.len(), "Storing batch in vector store");
        match self
            .store
            .store_documents_batch(
                self.source.collection_name(),
                batch_documents,
                UPSERT_BATCH_SIZE,
            )
            .await
        {
            Ok((stored, failed)) => {
                tracing::info!(stored, failed = failed.len(), "Batch stored");
            }
            Err(error) => {
                tracing::error!(error = %error, "Error storing batch in vector store");
            }
        }
    }

    /// Progress statistics for the source's document type.
    pub fn statistics(&self) -> Result<ProgressStatistics, ProgressError> {
        self.progress.get_statistics()
    }

    async fn print_final_statistics(&self) {
        println!("\n{}", "=".repeat(60));
        println!("INGESTION COMPLETE");
        println!("{}", "=".repeat(60));

        match self.progress.get_statistics() {
            Ok(stats) => {
                println!("Document Type: {}", stats.document_type);
                println!("Total Documents: {}", stats.total);
                println!("Completed: {}", stats.completed);
                println!("Failed: {}", stats.failed);
                println!("Pending: {}", stats.pending);
                println!("Success Rate: {:.1}%", stats.success_rate);
                if let Some(avg) = stats.avg_processing_time_ms {
                    println!("Avg Processing Time: {avg}ms");
                }

                let perf = self.monitor.get_statistics(None);
                println!("\nTotal Time: {}", perf.elapsed_formatted);
                println!("Throughput: {:.1} docs/minute", perf.throughput_per_minute);

                if let Ok(info) = self
                    .store
                    .get_collection_info(self.source.collection_name())
                    .await
                {
                    println!("\nCollection: {}", info.name);
                    println!("Total Chunks in Collection: {}", info.points_count);
                }

                if !stats.failed_documents.is_empty() {
                    println!("\n{}", "=".repeat(60));
                    println!("FAILED DOCUMENTS (showing up to 10):");
                    println!("{}", "-".repeat(60));
                    for failed in &stats.failed_documents {
                        println!("ID: {}", failed.document_id);
                        println!("Error: {}", failed.error);
                        println!("Failed At: {}", failed.failed_at);
                        println!("{}", "-".repeat(40));
                    }
                }
            }
            Err(error) => tracing::error!(error = %error, "Failed to read final statistics"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::extraction::{
        EoLlmFields, ExtractionError, MetadataExtractor, ScotusLlmFields,
    };
    use crate::processing::{ChunkingConfig, EmbeddingClient};
    use serde_json::Map;
    use std::sync::atomic::AtomicUsize;

    struct StubExtractor;

    #[async_trait]
    impl MetadataExtractor for StubExtractor {
        async fn scotus_fields(
            &self,
            _text: &str,
            _syllabus: Option<&str>,
        ) -> Result<ScotusLlmFields, ExtractionError> {
            Ok(ScotusLlmFields::fallback())
        }

        async fn eo_fields(&self, _text: &str) -> Result<EoLlmFields, ExtractionError> {
            Ok(EoLlmFields::fallback())
        }
    }

    struct CountingEmbedder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(vec![0.0; crate::processing::EMBEDDING_DIMENSION])
        }

        async fn generate_batch_embeddings(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(vec![vec![0.0; crate::processing::EMBEDDING_DIMENSION]; texts.len()])
        }
    }

    /// One valid document and one that fails court validation.
    struct FakeSource;

    #[async_trait(?Send)]
    impl IngestSource for FakeSource {
        fn document_type(&self) -> &'static str {
            "scotus"
        }

        fn collection_name(&self) -> &'static str {
            crate::config::SCOTUS_COLLECTION
        }

        async fn fetch_document_ids(
            &mut self,
            _options: &IngestOptions,
            _progress: &ProgressTracker,
        ) -> Result<Vec<String>, IngestError> {
            Ok(vec!["good".into(), "wrong-court".into()])
        }

        async fn prepare_document(
            &mut self,
            doc_id: &str,
            _builder: &PayloadBuilder,
        ) -> Result<Vec<ChunkPayload>, IngestError> {
            if doc_id == "wrong-court" {
                return Err(IngestError::Api(crate::apis::ApiError::WrongCourt(
                    "Opinion wrong-court belongs to court 'ca9' (not scotus). Case: X".into(),
                )));
            }
            Ok(vec![ChunkPayload {
                id: format!("{doc_id}_chunk_0"),
                text: "Held: X.".into(),
                embedding: Vec::new(),
                metadata: Map::new(),
            }])
        }
    }

    fn test_ingester(
        calls: Arc<AtomicUsize>,
    ) -> Ingester<FakeSource> {
        let builder = PayloadBuilder::new(
            Box::new(StubExtractor),
            ChunkingConfig::scotus_defaults(),
            ChunkingConfig::eo_defaults(),
        );
        let store =
            Arc::new(VectorStore::new("http://127.0.0.1:9", None).expect("store"));
        let progress = ProgressTracker::in_memory("scotus").expect("tracker");

        Ingester::new(
            FakeSource,
            builder,
            Box::new(CountingEmbedder { calls }),
            store,
            progress,
            IngestOptions {
                start_date: "2024-01-01".into(),
                end_date: "2024-12-31".into(),
                batch_size: 50,
                dry_run: true,
            },
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn validation_failure_marks_failed_without_embedding_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut ingester = test_ingester(calls.clone());

        ingester.run().await.expect("run completes");

        let stats = ingester.statistics().expect("stats");
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        let failure = &stats.failed_documents[0];
        assert_eq!(failure.document_id, "wrong-court");
        assert!(failure.error.contains("not scotus"));

        // Only the good document reached the embedder.
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn preset_shutdown_interrupts_before_any_document() {
        let calls = Arc::new(AtomicUsize::new(0));
        let builder = PayloadBuilder::new(
            Box::new(StubExtractor),
            ChunkingConfig::scotus_defaults(),
            ChunkingConfig::eo_defaults(),
        );
        let store =
            Arc::new(VectorStore::new("http://127.0.0.1:9", None).expect("store"));
        let progress = ProgressTracker::in_memory("scotus").expect("tracker");
        let shutdown = Arc::new(AtomicBool::new(true));

        let mut ingester = Ingester::new(
            FakeSource,
            builder,
            Box::new(CountingEmbedder {
                calls: calls.clone(),
            }),
            store,
            progress,
            IngestOptions {
                start_date: "2024-01-01".into(),
                end_date: "2024-12-31".into(),
                batch_size: 50,
                dry_run: true,
            },
            shutdown,
        );

        let error = ingester.run().await.expect_err("interrupted");
        assert!(matches!(error, IngestError::Interrupted));
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        // Interrupt leaves no document completed; everything resumes next run.
        let stats = ingester.statistics().expect("stats");
        assert_eq!(stats.completed, 0);
    }
}
