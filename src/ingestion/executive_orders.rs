//! Executive Order ingest source.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::apis::federal_register::FederalRegisterClient;
use crate::apis::{Document, EO_DOC_TYPE, FEDERAL_REGISTER_SOURCE, json_str};
use crate::config::EO_COLLECTION;
use crate::ingestion::progress::ProgressTracker;
use crate::ingestion::{IngestError, IngestOptions, IngestSource};
use crate::processing::{ChunkPayload, PayloadBuilder};

/// Ingest source for Executive Orders via the Federal Register.
///
/// Listing records are cached in memory so processing needs no extra metadata
/// round-trips, and raw-text fetches are cached by URL since consecutive orders
/// occasionally share one.
pub struct EoIngestSource {
    api: FederalRegisterClient,
    orders_metadata: HashMap<String, Value>,
    text_url_cache: HashMap<String, String>,
}

impl EoIngestSource {
    /// Build a source around a Federal Register client.
    pub fn new(api: FederalRegisterClient) -> Self {
        Self {
            api,
            orders_metadata: HashMap::new(),
            text_url_cache: HashMap::new(),
        }
    }
}

#[async_trait(?Send)]
impl IngestSource for EoIngestSource {
    fn document_type(&self) -> &'static str {
        "executive_order"
    }

    fn collection_name(&self) -> &'static str {
        EO_COLLECTION
    }

    async fn fetch_document_ids(
        &mut self,
        options: &IngestOptions,
        progress: &ProgressTracker,
    ) -> Result<Vec<String>, IngestError> {
        tracing::info!("Fetching Executive Orders from Federal Register API");
        let orders = self
            .api
            .list_executive_orders(&options.start_date, &options.end_date, None)
            .await?;
        tracing::info!(orders = orders.len(), "Fetched Executive Orders");

        let mut ids = Vec::with_capacity(orders.len());
        for order in orders {
            let doc_id = json_str(&order, "document_number");
            if doc_id.is_empty() {
                continue;
            }

            progress.add_document(
                &doc_id,
                Some(&json!({
                    "title": order.get("title").cloned().unwrap_or(Value::Null),
                    "executive_order_number": order
                        .get("executive_order_number")
                        .cloned()
                        .unwrap_or(Value::Null),
                    "signing_date": order.get("signing_date").cloned().unwrap_or(Value::Null),
                    "publication_date": order
                        .get("publication_date")
                        .cloned()
                        .unwrap_or(Value::Null),
                })),
            )?;

            self.orders_metadata.insert(doc_id.clone(), order);
            ids.push(doc_id);
        }

        Ok(ids)
    }

    async fn prepare_document(
        &mut self,
        doc_id: &str,
        builder: &PayloadBuilder,
    ) -> Result<Vec<ChunkPayload>, IngestError> {
        let order = self
            .orders_metadata
            .get(doc_id)
            .cloned()
            .ok_or_else(|| IngestError::Document(format!("No metadata found for order {doc_id}")))?;

        let eo_number = order
            .get("executive_order_number")
            .map(Value::to_string)
            .unwrap_or_else(|| "N/A".to_string());
        tracing::info!(eo_number = %eo_number, url = %json_str(&order, "html_url"), "Ingesting Executive Order");

        let raw_text_url = json_str(&order, "raw_text_url");
        if raw_text_url.is_empty() {
            return Err(IngestError::Document(format!(
                "No raw text URL for order {doc_id}"
            )));
        }

        let raw_text = match self.text_url_cache.get(&raw_text_url) {
            Some(cached) => {
                tracing::debug!(id = doc_id, "Using cached text");
                cached.clone()
            }
            None => {
                tracing::debug!(id = doc_id, "Fetching raw text");
                let text = self.api.get_executive_order_text(&raw_text_url).await?;
                self.text_url_cache.insert(raw_text_url.clone(), text.clone());
                text
            }
        };

        if raw_text.is_empty() {
            return Err(IngestError::Document(format!(
                "Could not fetch raw text for order {doc_id}"
            )));
        }

        let mut metadata = Map::new();
        for key in [
            "executive_order_number",
            "president",
            "signing_date",
            "publication_date",
            "citation",
            "html_url",
            "raw_text_url",
            "agencies",
        ] {
            if let Some(value) = order.get(key) {
                metadata.insert(key.to_string(), value.clone());
            }
        }
        metadata.insert("document_number".into(), Value::String(doc_id.to_string()));

        let date = {
            let signing = json_str(&order, "signing_date");
            if signing.is_empty() {
                json_str(&order, "publication_date")
            } else {
                signing
            }
        };

        let document = Document {
            id: doc_id.to_string(),
            title: json_str(&order, "title"),
            date,
            doc_type: EO_DOC_TYPE.to_string(),
            source: FEDERAL_REGISTER_SOURCE.to_string(),
            content: raw_text,
            url: json_str(&order, "html_url"),
            metadata,
        };

        Ok(builder.build_payloads_from_document(&document).await?)
    }
}
