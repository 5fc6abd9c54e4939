//! HTTP client wrapper for the Qdrant vector store.

use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
#[cfg(test)]
use serde_json::Map;

use crate::processing::embeddings::EMBEDDING_DIMENSION;
use crate::qdrant::payload::{build_point_payload, document_from_payload, point_id_for};
use crate::qdrant::types::{
    CollectionInfo, CollectionInfoResponse, ListCollectionsResponse, QueryResponse,
    QueryResponseResult, RetrieveResponse, ScrollResponse, SearchResult, StoreError,
    StoredDocument,
};

/// Default number of points sent per upsert request.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Lightweight HTTP client for vector store operations.
///
/// Collections are fixed at 1536 dimensions with cosine distance; every write and
/// query validates vector dimensions before touching the wire.
pub struct VectorStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl VectorStore {
    /// Construct a client against the given REST endpoint.
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(crate::http::USER_AGENT)
            .build()?;
        let base_url = normalize_base_url(endpoint).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(url = %base_url, "Initialized vector store client");

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a collection only when it is missing.
    pub async fn ensure_collection(&self, collection_name: &str) -> Result<(), StoreError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }
        tracing::debug!(collection = collection_name, "Creating collection");
        self.create_collection(collection_name).await
    }

    /// Create or update a collection with the fixed vector contract.
    pub async fn create_collection(&self, collection_name: &str) -> Result<(), StoreError> {
        let body = json!({
            "vectors": {
                "size": EMBEDDING_DIMENSION,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection ensured/created");
        })
        .await
    }

    /// Delete a collection and all of its points.
    pub async fn delete_collection(&self, collection_name: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{collection_name}"))
            .send()
            .await?;
        self.ensure_success(response, || {
            tracing::info!(collection = collection_name, "Collection deleted");
        })
        .await
    }

    /// Retrieve the names of all collections.
    pub async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self.request(Method::GET, "collections").send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            Ok(payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect())
        } else {
            Err(self.unexpected_status(response, "Failed to list collections").await)
        }
    }

    /// Fetch counts, status, and a sample of payload field names for a collection.
    pub async fn get_collection_info(
        &self,
        collection_name: &str,
    ) -> Result<CollectionInfo, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self
                .unexpected_status(response, "Failed to fetch collection info")
                .await);
        }

        let payload: CollectionInfoResponse = response.json().await?;
        let sample_metadata_fields = self.sample_payload_fields(collection_name).await?;

        Ok(CollectionInfo {
            name: collection_name.to_string(),
            points_count: payload.result.points_count.unwrap_or(0),
            vectors_count: payload
                .result
                .vectors_count
                .or(payload.result.points_count)
                .unwrap_or(0),
            indexed_vectors_count: payload.result.indexed_vectors_count.unwrap_or(0),
            status: payload.result.status.unwrap_or_default(),
            sample_metadata_fields,
        })
    }

    /// Upsert one document; the point id derives deterministically from its id.
    pub async fn store_document(
        &self,
        collection_name: &str,
        document: &StoredDocument,
    ) -> Result<(), StoreError> {
        validate_dimension(&document.embedding)?;
        self.ensure_collection(collection_name).await?;
        self.upsert_points(collection_name, std::slice::from_ref(document))
            .await
    }

    /// Upsert documents in batches with `wait=true`, returning the success count and
    /// the ids of documents that failed (bad dimension or failed batch).
    pub async fn store_documents_batch(
        &self,
        collection_name: &str,
        documents: &[StoredDocument],
        batch_size: usize,
    ) -> Result<(usize, Vec<String>), StoreError> {
        if documents.is_empty() {
            return Ok((0, Vec::new()));
        }

        self.ensure_collection(collection_name).await?;

        let mut valid = Vec::with_capacity(documents.len());
        let mut failed_ids = Vec::new();
        for document in documents {
            match validate_dimension(&document.embedding) {
                Ok(()) => valid.push(document),
                Err(error) => {
                    tracing::warn!(id = %document.id, error = %error, "Rejecting document");
                    failed_ids.push(document.id.clone());
                }
            }
        }

        let mut success_count = 0;
        let batch_size = batch_size.max(1);
        for batch in valid.chunks(batch_size) {
            let batch_refs: Vec<StoredDocument> = batch.iter().map(|d| (*d).clone()).collect();
            match self.upsert_points(collection_name, &batch_refs).await {
                Ok(()) => success_count += batch.len(),
                Err(error) => {
                    tracing::error!(
                        collection = collection_name,
                        size = batch.len(),
                        error = %error,
                        "Batch upsert failed"
                    );
                    failed_ids.extend(batch.iter().map(|d| d.id.clone()));
                }
            }
        }

        tracing::info!(
            collection = collection_name,
            stored = success_count,
            failed = failed_ids.len(),
            "Batch upsert finished"
        );
        Ok((success_count, failed_ids))
    }

    /// Retrieve a document by its original string id, or `None` when absent.
    pub async fn get_document(
        &self,
        collection_name: &str,
        original_id: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let point_id = point_id_for(original_id);
        let body = json!({
            "ids": [point_id.to_string()],
            "with_payload": true,
            "with_vector": true,
        });

        let response = self
            .request(Method::POST, &format!("collections/{collection_name}/points"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self
                .unexpected_status(response, "Failed to retrieve point")
                .await);
        }

        let payload: RetrieveResponse = response.json().await?;
        Ok(payload.result.into_iter().next().map(|point| {
            document_from_payload(point.payload.unwrap_or_default(), point.vector)
        }))
    }

    /// Check whether a document exists without retrieving payload or vector.
    pub async fn document_exists(
        &self,
        collection_name: &str,
        original_id: &str,
    ) -> Result<bool, StoreError> {
        let point_id = point_id_for(original_id);
        let body = json!({
            "ids": [point_id.to_string()],
            "with_payload": false,
            "with_vector": false,
        });

        let response = self
            .request(Method::POST, &format!("collections/{collection_name}/points"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self
                .unexpected_status(response, "Failed to check point existence")
                .await);
        }

        let payload: RetrieveResponse = response.json().await?;
        Ok(!payload.result.is_empty())
    }

    /// Delete a document by its original string id.
    pub async fn delete_document(
        &self,
        collection_name: &str,
        original_id: &str,
    ) -> Result<(), StoreError> {
        let point_id = point_id_for(original_id);
        let body = json!({ "points": [point_id.to_string()] });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, id = original_id, "Point deleted");
        })
        .await
    }

    /// Perform a filtered similarity search, returning scored documents.
    pub async fn search(
        &self,
        collection_name: &str,
        query_vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
        query_filter: Option<Value>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        validate_dimension(query_vector)?;

        let mut body = json!({
            "query": query_vector,
            "limit": limit,
            "with_payload": true,
        });
        let obj = body.as_object_mut().unwrap_or_else(|| unreachable!());
        if let Some(threshold) = score_threshold {
            obj.insert("score_threshold".into(), Value::from(threshold));
        }
        if let Some(filter) = query_filter {
            obj.insert("filter".into(), filter);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.unexpected_status(response, "Search failed").await);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points
            .into_iter()
            .map(|point| SearchResult {
                score: point.score,
                document: document_from_payload(point.payload.unwrap_or_default(), point.vector),
            })
            .collect())
    }

    /// Alias for [`search`](Self::search) under the name the retrieval server uses.
    pub async fn semantic_search(
        &self,
        collection_name: &str,
        query_vector: &[f32],
        limit: usize,
        score_threshold: Option<f32>,
        query_filter: Option<Value>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        self.search(
            collection_name,
            query_vector,
            limit,
            score_threshold,
            query_filter,
        )
        .await
    }

    async fn upsert_points(
        &self,
        collection_name: &str,
        documents: &[StoredDocument],
    ) -> Result<(), StoreError> {
        let serialized: Vec<Value> = documents
            .iter()
            .map(|document| {
                json!({
                    "id": point_id_for(&document.id).to_string(),
                    "vector": document.embedding,
                    "payload": build_point_payload(document),
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await
    }

    /// Fetch up to `limit` stored documents without vectors, for previews.
    pub async fn sample_documents(
        &self,
        collection_name: &str,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/scroll"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self
                .unexpected_status(response, "Failed to sample documents")
                .await);
        }

        let payload: ScrollResponse = response.json().await?;
        Ok(payload
            .result
            .points
            .into_iter()
            .filter_map(|point| point.payload)
            .map(|payload| document_from_payload(payload, None))
            .collect())
    }

    async fn sample_payload_fields(
        &self,
        collection_name: &str,
    ) -> Result<Vec<String>, StoreError> {
        let body = json!({
            "limit": 1,
            "with_payload": true,
            "with_vector": false,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/scroll"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            // Sampling is best-effort; an empty preview is fine.
            return Ok(Vec::new());
        }

        let payload: ScrollResponse = response.json().await?;
        Ok(payload
            .result
            .points
            .into_iter()
            .next()
            .and_then(|point| point.payload)
            .map(|payload| payload.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(self
                .unexpected_status(response, "Collection existence check failed")
                .await),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self.client.request(method, url);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.header("api-key", api_key);
        }
        request
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), StoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            Err(self.unexpected_status(response, "Qdrant request failed").await)
        }
    }

    async fn unexpected_status(&self, response: reqwest::Response, context: &str) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = StoreError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "{context}");
        error
    }
}

fn validate_dimension(vector: &[f32]) -> Result<(), StoreError> {
    if vector.len() != EMBEDDING_DIMENSION {
        return Err(StoreError::DimensionMismatch {
            expected: EMBEDDING_DIMENSION,
            actual: vector.len(),
        });
    }
    Ok(())
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, Method::PUT, MockServer};
    use serde_json::json;

    fn store_for(server: &MockServer) -> VectorStore {
        VectorStore {
            client: Client::builder()
                .user_agent("govreporter-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        }
    }

    fn sample_document(id: &str) -> StoredDocument {
        let mut metadata = Map::new();
        metadata.insert("case_name".into(), json!("Smith v. Jones"));
        StoredDocument {
            id: id.into(),
            text: "Held: X.".into(),
            embedding: vec![0.0; EMBEDDING_DIMENSION],
            metadata,
        }
    }

    #[tokio::test]
    async fn upsert_uses_deterministic_point_ids_and_wait() {
        let server = MockServer::start_async().await;
        let expected_id = point_id_for("12345_chunk_0").to_string();

        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/collections/demo");
                then.status(200).json_body(json!({"result": {"status": "green"}}));
            })
            .await;
        let upsert = server
            .mock_async(move |when, then| {
                when.method(PUT)
                    .path("/collections/demo/points")
                    .query_param("wait", "true")
                    .body_contains(&expected_id);
                then.status(200).json_body(json!({"result": {}, "status": "ok"}));
            })
            .await;

        let (stored, failed) = store_for(&server)
            .store_documents_batch("demo", &[sample_document("12345_chunk_0")], 100)
            .await
            .expect("batch");

        upsert.assert();
        assert_eq!(stored, 1);
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn wrong_dimension_documents_are_reported_as_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET).path("/collections/demo");
                then.status(200).json_body(json!({"result": {"status": "green"}}));
            })
            .await;

        let mut bad = sample_document("12345_chunk_1");
        bad.embedding = vec![0.0; 3];

        let (stored, failed) = store_for(&server)
            .store_documents_batch("demo", &[bad], 100)
            .await
            .expect("batch");
        assert_eq!(stored, 0);
        assert_eq!(failed, vec!["12345_chunk_1".to_string()]);
    }

    #[tokio::test]
    async fn get_document_round_trips_the_original_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/demo/points");
                then.status(200).json_body(json!({
                    "result": [
                        {
                            "id": point_id_for("12345_chunk_0").to_string(),
                            "payload": {
                                "original_id": "12345_chunk_0",
                                "text": "Held: X.",
                                "case_name": "Smith v. Jones"
                            },
                            "vector": [0.25, 0.75]
                        }
                    ]
                }));
            })
            .await;

        let document = store_for(&server)
            .get_document("demo", "12345_chunk_0")
            .await
            .expect("request")
            .expect("document present");

        assert_eq!(document.id, "12345_chunk_0");
        assert_eq!(document.text, "Held: X.");
        assert_eq!(document.metadata["case_name"], "Smith v. Jones");
        assert_eq!(document.embedding, vec![0.25, 0.75]);
    }

    #[tokio::test]
    async fn missing_documents_return_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/demo/points");
                then.status(200).json_body(json!({"result": []}));
            })
            .await;

        let document = store_for(&server)
            .get_document("demo", "nope_chunk_0")
            .await
            .expect("request");
        assert!(document.is_none());
    }

    #[tokio::test]
    async fn search_passes_filter_and_parses_scored_points() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/query")
                    .body_contains("opinion_type");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": [
                        {
                            "id": "x",
                            "score": 0.87,
                            "payload": {
                                "original_id": "12345_chunk_0",
                                "text": "Held: X.",
                                "opinion_type": "majority"
                            }
                        }
                    ]
                }));
            })
            .await;

        let filter = crate::qdrant::filters::and_filter(vec![
            crate::qdrant::filters::field_match("opinion_type", json!("majority")),
        ]);

        let results = store_for(&server)
            .semantic_search("demo", &vec![0.0; EMBEDDING_DIMENSION], 5, Some(0.4), filter)
            .await
            .expect("search");

        mock.assert();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.87).abs() < f32::EPSILON);
        assert_eq!(results[0].document.id, "12345_chunk_0");
        assert_eq!(results[0].document.metadata["opinion_type"], "majority");
    }

    #[tokio::test]
    async fn query_vector_dimension_is_validated() {
        let server = MockServer::start_async().await;
        let error = store_for(&server)
            .search("demo", &[0.1, 0.2], 5, None, None)
            .await
            .expect_err("dimension mismatch");
        assert!(matches!(error, StoreError::DimensionMismatch { .. }));
    }
}
