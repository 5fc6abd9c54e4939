//! Command implementations behind the CLI surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rmcp::{service::ServiceExt, transport::stdio};
use thiserror::Error;

use crate::apis::court_listener::CourtListenerClient;
use crate::apis::federal_register::FederalRegisterClient;
use crate::apis::{ApiError, validate_date_format};
use crate::cli::parser::{Corpus, IngestArgs, IngestTarget, InfoTopic};
use crate::config::{Config, ConfigError, EO_COLLECTION, SCOTUS_COLLECTION};
use crate::ingestion::{
    EoIngestSource, IngestError, IngestOptions, Ingester, ProgressError, ProgressTracker,
    ScotusIngestSource,
};
use crate::mcp::format::{HitKind, format_search_results};
use crate::mcp::handlers::search::to_hit;
use crate::mcp::{GovReporterMcpServer, RetrievalService, ServiceError};
use crate::processing::{
    EmbeddingError, OpenAiEmbeddingClient, OpenAiExtractor, PayloadBuilder,
};
use crate::qdrant::{StoreError, VectorStore};

const SCOTUS_DEFAULT_BATCH_SIZE: usize = 50;
const EO_DEFAULT_BATCH_SIZE: usize = 25;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Invalid command-line arguments.
    #[error("{0}")]
    InvalidArguments(String),
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Government API failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Vector store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Progress database failure.
    #[error(transparent)]
    Progress(#[from] ProgressError),
    /// Ingestion pipeline failure.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Retrieval service construction failure.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Embedding failure during a query.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// MCP server transport failure.
    #[error("MCP server error: {0}")]
    Server(String),
}

impl CommandError {
    /// Whether the command ended because the user interrupted it.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Ingest(IngestError::Interrupted))
    }
}

/// Run an ingestion command for the selected corpus (or both).
pub async fn run_ingest(target: &IngestTarget, config: &Arc<Config>) -> Result<(), CommandError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_interrupt_watcher(shutdown.clone());

    match target {
        IngestTarget::Scotus(args) => {
            let store = open_store(args, config)?;
            ingest_scotus(args, config, store, shutdown).await
        }
        IngestTarget::Eo(args) => {
            let store = open_store(args, config)?;
            ingest_eo(args, config, store, shutdown).await
        }
        IngestTarget::All(args) => {
            // One shared store client for both corpora; SCOTUS failure skips EO.
            let store = open_store(args, config)?;
            ingest_scotus(args, config, store.clone(), shutdown.clone()).await?;
            ingest_eo(args, config, store, shutdown).await
        }
    }
}

async fn ingest_scotus(
    args: &IngestArgs,
    config: &Arc<Config>,
    store: Arc<VectorStore>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), CommandError> {
    validate_range(args)?;
    let token = config.require_court_listener_token()?;
    let api = CourtListenerClient::new(token)?;

    let progress_db = args
        .progress_db
        .clone()
        .unwrap_or_else(|| Corpus::Scotus.default_progress_db());
    let progress = ProgressTracker::open(progress_db, "scotus")?;

    let mut ingester = Ingester::new(
        ScotusIngestSource::new(api),
        payload_builder(config),
        Box::new(OpenAiEmbeddingClient::new(&config.openai_api_key)),
        store,
        progress,
        IngestOptions {
            start_date: args.start_date.clone(),
            end_date: args.end_date.clone(),
            batch_size: args.batch_size.unwrap_or(SCOTUS_DEFAULT_BATCH_SIZE),
            dry_run: args.dry_run,
        },
        shutdown,
    );

    ingester.run().await?;
    Ok(())
}

async fn ingest_eo(
    args: &IngestArgs,
    config: &Arc<Config>,
    store: Arc<VectorStore>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), CommandError> {
    validate_range(args)?;
    let api = FederalRegisterClient::new()?;

    let progress_db = args
        .progress_db
        .clone()
        .unwrap_or_else(|| Corpus::Eo.default_progress_db());
    let progress = ProgressTracker::open(progress_db, "executive_order")?;

    let mut ingester = Ingester::new(
        EoIngestSource::new(api),
        payload_builder(config),
        Box::new(OpenAiEmbeddingClient::new(&config.openai_api_key)),
        store,
        progress,
        IngestOptions {
            start_date: args.start_date.clone(),
            end_date: args.end_date.clone(),
            batch_size: args.batch_size.unwrap_or(EO_DEFAULT_BATCH_SIZE),
            dry_run: args.dry_run,
        },
        shutdown,
    );

    ingester.run().await?;
    Ok(())
}

/// Serve the MCP retrieval server over stdio until the host disconnects.
pub async fn run_server(config: Arc<Config>) -> Result<(), CommandError> {
    let service = Arc::new(RetrievalService::new(config)?);
    let server = GovReporterMcpServer::new(service);

    let running = server
        .serve(stdio())
        .await
        .map_err(|err| CommandError::Server(err.to_string()))?;

    running
        .waiting()
        .await
        .map_err(|err| CommandError::Server(err.to_string()))?;

    Ok(())
}

/// Run a one-off semantic query against both collections and print the results.
pub async fn run_query(
    config: Arc<Config>,
    query: &str,
    limit: usize,
) -> Result<(), CommandError> {
    let service = RetrievalService::new(config)?;
    let vector = service.embed_query(query).await?;

    let mut hits = Vec::new();
    for (collection, kind) in [
        (SCOTUS_COLLECTION, HitKind::Scotus),
        (EO_COLLECTION, HitKind::ExecutiveOrder),
    ] {
        let results = service
            .store()
            .semantic_search(collection, &vector, limit, None, None)
            .await?;
        hits.extend(results.into_iter().map(|result| to_hit(kind, result)));
    }

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);

    println!("{}", format_search_results(query, &hits));
    Ok(())
}

/// Inspect collections, stored samples, or ingestion statistics.
pub async fn run_info(topic: &InfoTopic, config: &Arc<Config>) -> Result<(), CommandError> {
    match topic {
        InfoTopic::Collections => {
            let store = VectorStore::new(&config.qdrant_endpoint(), config.qdrant_api_key.clone())?;
            let names = store.list_collections().await?;
            let mut infos = Vec::with_capacity(names.len());
            for name in names {
                infos.push(store.get_collection_info(&name).await?);
            }
            println!("{}", crate::mcp::format::format_collections_list(&infos));
        }
        InfoTopic::Sample { corpus, limit } => {
            let store = VectorStore::new(&config.qdrant_endpoint(), config.qdrant_api_key.clone())?;
            let documents = store.sample_documents(corpus.collection(), *limit).await?;
            if documents.is_empty() {
                println!("Collection '{}' is empty.", corpus.collection());
                return Ok(());
            }
            for document in documents {
                let section = document
                    .metadata
                    .get("section_label")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("-");
                let title = document
                    .metadata
                    .get("title")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("-");
                let excerpt: String = document.text.chars().take(200).collect();
                println!("{} | {} | {}", document.id, title, section);
                println!("  {excerpt}");
                println!();
            }
        }
        InfoTopic::Stats {
            corpus,
            progress_db,
        } => {
            let path = progress_db
                .clone()
                .unwrap_or_else(|| corpus.default_progress_db());
            let tracker = ProgressTracker::open(path, corpus.document_type())?;
            let stats = tracker.get_statistics()?;

            println!("Document Type: {}", stats.document_type);
            println!("Total Documents: {}", stats.total);
            println!("Completed: {}", stats.completed);
            println!("Failed: {}", stats.failed);
            println!("Pending: {}", stats.pending);
            println!("Processing: {}", stats.processing);
            println!("Success Rate: {:.1}%", stats.success_rate);
            if let Some(avg) = stats.avg_processing_time_ms {
                println!("Avg Processing Time: {avg}ms");
            }

            let runs = tracker.get_run_history(10)?;
            if !runs.is_empty() {
                println!("\nRecent Runs:");
                for run in runs {
                    println!(
                        "  #{} {} -> {} | total {} | completed {} | failed {} | started {}",
                        run.run_id,
                        run.start_date,
                        run.end_date,
                        run.total_documents,
                        run.completed_documents,
                        run.failed_documents,
                        run.started_at,
                    );
                }
            }

            if !stats.failed_documents.is_empty() {
                println!("\nRecent Failures:");
                for failed in stats.failed_documents {
                    println!("  {}: {}", failed.document_id, failed.error);
                }
            }
        }
    }
    Ok(())
}

fn payload_builder(config: &Config) -> PayloadBuilder {
    PayloadBuilder::new(
        Box::new(OpenAiExtractor::new(&config.openai_api_key)),
        config.scotus_chunking,
        config.eo_chunking,
    )
}

fn open_store(args: &IngestArgs, config: &Config) -> Result<Arc<VectorStore>, CommandError> {
    let endpoint = args
        .qdrant_url
        .clone()
        .unwrap_or_else(|| config.qdrant_endpoint());
    Ok(Arc::new(VectorStore::new(
        &endpoint,
        config.qdrant_api_key.clone(),
    )?))
}

fn validate_range(args: &IngestArgs) -> Result<(), CommandError> {
    if !validate_date_format(&args.start_date) {
        return Err(CommandError::InvalidArguments(format!(
            "Invalid --start-date '{}': expected YYYY-MM-DD",
            args.start_date
        )));
    }
    if !validate_date_format(&args.end_date) {
        return Err(CommandError::InvalidArguments(format!(
            "Invalid --end-date '{}': expected YYYY-MM-DD",
            args.end_date
        )));
    }
    if args.end_date < args.start_date {
        return Err(CommandError::InvalidArguments(
            "--end-date must not precede --start-date".to_string(),
        ));
    }
    Ok(())
}

fn spawn_interrupt_watcher(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing current document");
            flag.store(true, Ordering::Relaxed);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(start: &str, end: &str) -> IngestArgs {
        IngestArgs {
            start_date: start.into(),
            end_date: end.into(),
            batch_size: None,
            progress_db: None,
            qdrant_url: None,
            dry_run: false,
        }
    }

    #[test]
    fn range_validation_rejects_bad_dates_and_inverted_ranges() {
        assert!(validate_range(&args("2024-01-01", "2024-12-31")).is_ok());
        assert!(validate_range(&args("2024-1-1", "2024-12-31")).is_err());
        assert!(validate_range(&args("2024-12-31", "2024-01-01")).is_err());
    }
}
