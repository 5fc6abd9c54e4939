//! CourtListener v4 adapter for Supreme Court opinions.
//!
//! Listing walks the **clusters** endpoint (the opinions endpoint times out under
//! date filters) and emits each cluster's `sub_opinions` URLs as opinion ids. A
//! separate count request establishes the total before pagination so a sanity cap
//! can abort runaway walks when the court filter misbehaves.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use time::macros::format_description;

use crate::apis::{
    ApiError, COURT_LISTENER_SOURCE, Document, GovernmentApi, SCOTUS_DOC_TYPE,
    citations::build_bluebook_citation, json_str, validate_date_format,
};
use crate::http::{DEFAULT_TIMEOUT, PAGINATION_TIMEOUT, RateLimitedClient};

const BASE_URL: &str = "https://www.courtlistener.com/api/rest/v4";
const RATE_LIMIT_DELAY: Duration = Duration::from_millis(100);
const MAX_PAGES: usize = 100;
const CLUSTER_PAGE_SIZE: usize = 20;

/// Minimal opinion shape consumed from the opinions endpoint.
#[derive(Debug, Deserialize)]
pub struct Opinion {
    /// Opinion identifier.
    pub id: i64,
    /// URL of the cluster this opinion belongs to.
    #[serde(default)]
    pub cluster: Option<String>,
    /// Full plain text, when extracted.
    #[serde(default)]
    pub plain_text: Option<String>,
    /// Authoring judge id.
    #[serde(default)]
    pub author_id: Option<i64>,
    /// CourtListener opinion-type code (e.g. `010combined`).
    #[serde(rename = "type", default)]
    pub opinion_type: Option<String>,
    /// Page count of the source document.
    #[serde(default)]
    pub page_count: Option<i64>,
    /// Direct download URL for the source document.
    #[serde(default)]
    pub download_url: Option<String>,
    /// Web URL for the opinion.
    #[serde(default)]
    pub absolute_url: Option<String>,
    /// Record creation timestamp.
    #[serde(default)]
    pub date_created: Option<String>,
    /// Whether the opinion was issued per curiam.
    #[serde(default)]
    pub per_curiam: bool,
}

/// Minimal cluster shape consumed from the clusters endpoint.
#[derive(Debug, Deserialize)]
pub struct Cluster {
    /// Case name for the decision.
    #[serde(default)]
    pub case_name: String,
    /// Reporter citations attached to the decision.
    #[serde(default)]
    pub citations: Vec<Value>,
    /// Filing date in `YYYY-MM-DD`.
    #[serde(default)]
    pub date_filed: String,
    /// URL of the docket this cluster belongs to.
    #[serde(default)]
    pub docket: Option<String>,
    /// URLs of the opinions in this cluster.
    #[serde(default)]
    pub sub_opinions: Vec<String>,
    /// Judges string, when present.
    #[serde(default)]
    pub judges: Option<String>,
    /// Docket number, when the API includes it.
    #[serde(default)]
    pub docket_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Docket {
    #[serde(default)]
    court_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterPage {
    #[serde(default)]
    results: Vec<Cluster>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    #[serde(default)]
    count: Option<u64>,
}

/// Client for the CourtListener REST API, scoped to Supreme Court opinions.
pub struct CourtListenerClient {
    http: RateLimitedClient,
    base_url: String,
}

impl CourtListenerClient {
    /// Construct a client authenticated with the given API token.
    pub fn new(token: &str) -> Result<Self, ApiError> {
        Self::with_base_url(token, BASE_URL.to_string())
    }

    /// Construct a client against an alternate endpoint (used by tests).
    pub fn with_base_url(token: &str, base_url: String) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|_| ApiError::MalformedResponse("invalid API token".to_string()))?;
        headers.insert(AUTHORIZATION, value);

        let http = RateLimitedClient::new(
            RATE_LIMIT_DELAY,
            3,
            Duration::from_secs(1),
            headers,
            DEFAULT_TIMEOUT,
        )?;

        Ok(Self { http, base_url })
    }

    /// Fetch a single opinion by id.
    pub async fn get_opinion(&self, opinion_id: &str) -> Result<Opinion, ApiError> {
        let url = format!("{}/opinions/{}/", self.base_url, opinion_id);
        let response = self.http.get(&url, &[]).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch cluster data from its full URL (as referenced by an opinion).
    pub async fn get_cluster(&self, cluster_url: &str) -> Result<Cluster, ApiError> {
        let response = self.http.get(cluster_url, &[]).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Verify that an opinion's docket belongs to the Supreme Court.
    ///
    /// Traverses opinion → cluster → docket and checks `court_id == "scotus"`. This
    /// defends against stale search indexes that occasionally surface other courts'
    /// opinions under the SCOTUS filter.
    pub async fn validate_court(&self, opinion_id: &str) -> Result<(), ApiError> {
        let opinion = self.get_opinion(opinion_id).await?;
        let cluster_url = opinion.cluster.ok_or(ApiError::MissingField("cluster"))?;
        let cluster = self.get_cluster(&cluster_url).await?;
        let docket_url = cluster.docket.ok_or(ApiError::MissingField("docket"))?;

        let response = self.http.get(&docket_url, &[]).await?.error_for_status()?;
        let docket: Docket = response.json().await?;
        let court_id = docket.court_id.ok_or(ApiError::MissingField("court_id"))?;

        if court_id != "scotus" {
            return Err(ApiError::WrongCourt(format!(
                "Opinion {opinion_id} belongs to court '{court_id}' (not scotus). Case: {}",
                if cluster.case_name.is_empty() {
                    "Unknown Case"
                } else {
                    &cluster.case_name
                }
            )));
        }

        Ok(())
    }

    /// List opinion ids filed in `[start_date, end_date]`, newest first.
    ///
    /// Aborts with an empty result when the observed count wildly exceeds what SCOTUS
    /// could plausibly issue over the range (roughly 100 opinions per year).
    pub async fn list_document_ids(
        &self,
        start_date: &str,
        end_date: &str,
        max: Option<usize>,
    ) -> Result<Vec<String>, ApiError> {
        if !validate_date_format(start_date) {
            return Err(ApiError::InvalidDate(start_date.to_string()));
        }
        if !validate_date_format(end_date) {
            return Err(ApiError::InvalidDate(end_date.to_string()));
        }

        let listing_url = format!("{}/clusters/", self.base_url);
        let base_params = [
            ("docket__court", "scotus".to_string()),
            ("order_by", "-date_filed,id".to_string()),
            ("date_filed__gte", start_date.to_string()),
            ("date_filed__lte", end_date.to_string()),
            ("page_size", CLUSTER_PAGE_SIZE.to_string()),
        ];

        let mut count_params: Vec<(&str, String)> = base_params.to_vec();
        count_params.push(("count", "on".to_string()));
        let count_response = self
            .http
            .get_with_timeout(&listing_url, &count_params, Some(PAGINATION_TIMEOUT))
            .await?
            .error_for_status()?;
        let count: CountResponse = count_response.json().await?;

        let mut max_clusters: u64 = 1000;
        if let Some(total) = count.count {
            tracing::info!(total, "Total SCOTUS clusters available");
            let expected_max = expected_opinion_count(start_date, end_date);
            if total > 1000u64.max(expected_max * 2) {
                tracing::error!(
                    total,
                    expected_max,
                    "Cluster count far exceeds what SCOTUS could issue; aborting listing"
                );
                return Ok(Vec::new());
            }
            max_clusters = total;
        } else {
            tracing::warn!("Could not determine cluster count, proceeding with caution");
        }

        let mut opinion_ids = Vec::new();
        let mut clusters_processed: u64 = 0;
        let mut next_url = Some(listing_url);
        let mut params: Vec<(&str, String)> = base_params.to_vec();
        let mut page = 0usize;

        while let Some(url) = next_url {
            page += 1;
            if page > MAX_PAGES {
                tracing::warn!(page, "Reached maximum page limit, stopping pagination");
                break;
            }
            if clusters_processed >= max_clusters {
                break;
            }

            let response = self
                .http
                .get_with_timeout(&url, &params, Some(PAGINATION_TIMEOUT))
                .await?
                .error_for_status()?;
            let body: ClusterPage = response.json().await?;

            if body.results.is_empty() {
                break;
            }

            for cluster in &body.results {
                clusters_processed += 1;
                for opinion_url in &cluster.sub_opinions {
                    if let Some(id) = opinion_id_from_url(opinion_url) {
                        opinion_ids.push(id);
                        if let Some(cap) = max {
                            if opinion_ids.len() >= cap {
                                return Ok(opinion_ids);
                            }
                        }
                    } else {
                        tracing::warn!(url = %opinion_url, "Could not extract opinion id from URL");
                    }
                }
                if clusters_processed >= max_clusters {
                    break;
                }
            }

            tracing::info!(
                page,
                clusters = clusters_processed,
                opinions = opinion_ids.len(),
                "Fetched cluster page"
            );

            next_url = body.next;
            // Subsequent pages carry the filters inside the `next` URL.
            params = Vec::new();
        }

        Ok(opinion_ids)
    }

    /// Normalize raw opinion JSON into a flat metadata map.
    pub fn extract_basic_metadata(&self, raw: &Value) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("id".into(), raw.get("id").cloned().unwrap_or(Value::Null));
        metadata.insert(
            "cluster".into(),
            raw.get("cluster").cloned().unwrap_or(Value::Null),
        );
        let date = json_str(raw, "date_created");
        let date = date.split('T').next().unwrap_or_default().to_string();
        metadata.insert("date".into(), Value::String(date));
        metadata.insert(
            "plain_text".into(),
            Value::String(json_str(raw, "plain_text")),
        );
        metadata.insert(
            "author_id".into(),
            raw.get("author_id").cloned().unwrap_or(Value::Null),
        );
        metadata.insert(
            "type".into(),
            raw.get("type").cloned().unwrap_or(Value::Null),
        );
        metadata.insert(
            "page_count".into(),
            raw.get("page_count").cloned().unwrap_or(Value::Null),
        );
        metadata.insert(
            "download_url".into(),
            raw.get("download_url").cloned().unwrap_or(Value::Null),
        );
        metadata
    }
}

#[async_trait]
impl GovernmentApi for CourtListenerClient {
    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        let opinion = self.get_opinion(id).await?;
        let cluster_url = opinion
            .cluster
            .clone()
            .ok_or(ApiError::MissingField("cluster"))?;
        let cluster = self.get_cluster(&cluster_url).await?;

        let citation = build_bluebook_citation(&cluster.citations, &cluster.date_filed);

        let mut metadata = Map::new();
        metadata.insert("case_name".into(), Value::String(cluster.case_name.clone()));
        if let Some(citation) = &citation {
            metadata.insert("citation".into(), Value::String(citation.clone()));
        }
        if let Some(opinion_type) = &opinion.opinion_type {
            metadata.insert("type".into(), Value::String(opinion_type.clone()));
        }
        if let Some(docket_number) = &cluster.docket_number {
            metadata.insert("docket_number".into(), Value::String(docket_number.clone()));
        }
        if let Some(judges) = &cluster.judges {
            metadata.insert("judges".into(), Value::String(judges.clone()));
        }
        metadata.insert("per_curiam".into(), Value::Bool(opinion.per_curiam));

        let url = opinion
            .absolute_url
            .clone()
            .or_else(|| opinion.download_url.clone())
            .unwrap_or_default();

        Ok(Document {
            id: id.to_string(),
            title: cluster.case_name,
            date: cluster.date_filed,
            doc_type: SCOTUS_DOC_TYPE.to_string(),
            source: COURT_LISTENER_SOURCE.to_string(),
            content: opinion.plain_text.unwrap_or_default(),
            url,
            metadata,
        })
    }

    async fn get_document_text(&self, id: &str) -> Result<String, ApiError> {
        let opinion = self.get_opinion(id).await?;
        Ok(opinion.plain_text.unwrap_or_default())
    }
}

/// Extract the trailing path segment of a sub-opinion URL.
fn opinion_id_from_url(url: &str) -> Option<String> {
    let id = url.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Rough upper bound on opinions SCOTUS could file over a date range (~100/year).
fn expected_opinion_count(start_date: &str, end_date: &str) -> u64 {
    let format = format_description!("[year]-[month]-[day]");
    let (Ok(start), Ok(end)) = (
        time::Date::parse(start_date, &format),
        time::Date::parse(end_date, &format),
    ) else {
        return 0;
    };
    let days = (end - start).whole_days().max(0) as f64;
    (days / 365.0 * 100.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> CourtListenerClient {
        CourtListenerClient::with_base_url("test-token", server.base_url()).expect("client")
    }

    #[tokio::test]
    async fn validate_court_rejects_non_scotus_dockets() {
        let server = MockServer::start_async().await;
        let cluster_url = server.url("/clusters/9001/");
        let docket_url = server.url("/dockets/42/");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/opinions/123456/");
                then.status(200)
                    .json_body(json!({"id": 123456, "cluster": cluster_url}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/clusters/9001/");
                then.status(200).json_body(json!({
                    "case_name": "United States v. Example",
                    "docket": docket_url
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/dockets/42/");
                then.status(200).json_body(json!({"court_id": "ca9"}));
            })
            .await;

        let error = client_for(&server)
            .validate_court("123456")
            .await
            .expect_err("wrong court should fail validation");
        let message = error.to_string();
        assert!(message.contains("not scotus"), "message: {message}");
        assert!(message.contains("ca9"));
    }

    #[tokio::test]
    async fn validate_court_accepts_scotus_dockets() {
        let server = MockServer::start_async().await;
        let cluster_url = server.url("/clusters/9001/");
        let docket_url = server.url("/dockets/42/");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/opinions/123456/");
                then.status(200)
                    .json_body(json!({"id": 123456, "cluster": cluster_url}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/clusters/9001/");
                then.status(200)
                    .json_body(json!({"case_name": "Smith v. Jones", "docket": docket_url}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/dockets/42/");
                then.status(200).json_body(json!({"court_id": "scotus"}));
            })
            .await;

        client_for(&server)
            .validate_court("123456")
            .await
            .expect("scotus docket should validate");
    }

    #[tokio::test]
    async fn get_document_assembles_citation_and_metadata() {
        let server = MockServer::start_async().await;
        let cluster_url = server.url("/clusters/9001/");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/opinions/123456/");
                then.status(200).json_body(json!({
                    "id": 123456,
                    "cluster": cluster_url,
                    "plain_text": "SYLLABUS\n\nHeld: X.",
                    "type": "020lead",
                    "per_curiam": false
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/clusters/9001/");
                then.status(200).json_body(json!({
                    "case_name": "Smith v. Jones",
                    "date_filed": "2024-05-16",
                    "citations": [
                        {"type": 2, "volume": "144", "reporter": "S. Ct.", "page": "1474"},
                        {"type": 1, "volume": "601", "reporter": "U.S.", "page": "416"}
                    ]
                }));
            })
            .await;

        let document = client_for(&server)
            .get_document("123456")
            .await
            .expect("document");

        assert_eq!(document.title, "Smith v. Jones");
        assert_eq!(document.date, "2024-05-16");
        assert_eq!(document.doc_type, SCOTUS_DOC_TYPE);
        assert_eq!(document.source, COURT_LISTENER_SOURCE);
        assert_eq!(document.metadata["citation"], "601 U.S. 416 (2024)");
        assert_eq!(document.metadata["type"], "020lead");
    }

    #[tokio::test]
    async fn listing_aborts_when_count_is_implausible() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/clusters/")
                    .query_param("count", "on");
                then.status(200).json_body(json!({"count": 50000}));
            })
            .await;

        let ids = client_for(&server)
            .list_document_ids("2023-01-01", "2024-01-01", None)
            .await
            .expect("listing returns empty on abort");
        assert!(ids.is_empty());
    }

    #[test]
    fn opinion_id_extraction_handles_trailing_slash() {
        assert_eq!(
            opinion_id_from_url("https://example.com/api/rest/v4/opinions/998877/"),
            Some("998877".to_string())
        );
        assert_eq!(opinion_id_from_url(""), None);
    }
}
