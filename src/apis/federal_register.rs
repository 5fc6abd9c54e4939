//! Federal Register v1 adapter for Presidential Executive Orders.
//!
//! The Federal Register API requires no authentication but enforces 60 requests per
//! minute, so this adapter keeps 1.1 s between requests and retries 429 up to five
//! times with doubling backoff. Raw order text sometimes arrives wrapped in HTML;
//! [`clean_raw_text`] strips it down to the `<pre>` body.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::apis::{
    ApiError, Document, EO_DOC_TYPE, FEDERAL_REGISTER_SOURCE, GovernmentApi, json_str,
    validate_date_format,
};
use crate::http::{DEFAULT_TIMEOUT, RateLimitedClient};

const BASE_URL: &str = "https://www.federalregister.gov/api/v1";
const RATE_LIMIT_DELAY: Duration = Duration::from_millis(1100);
const MAX_RETRIES: u32 = 5;
const PAGE_SIZE: usize = 100;

/// Fields requested from the documents listing endpoint.
const LISTING_FIELDS: &[&str] = &[
    "document_number",
    "title",
    "executive_order_number",
    "publication_date",
    "signing_date",
    "president",
    "citation",
    "html_url",
    "pdf_url",
    "full_text_xml_url",
    "body_html_url",
    "raw_text_url",
    "json_url",
];

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    total_pages: Option<u64>,
}

/// Client for the Federal Register REST API, scoped to executive orders.
pub struct FederalRegisterClient {
    http: RateLimitedClient,
    base_url: String,
}

impl FederalRegisterClient {
    /// Construct an unauthenticated client against the public API.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(BASE_URL.to_string())
    }

    /// Construct a client against an alternate endpoint (used by tests).
    pub fn with_base_url(base_url: String) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = RateLimitedClient::new(
            RATE_LIMIT_DELAY,
            MAX_RETRIES,
            Duration::from_secs(1),
            headers,
            DEFAULT_TIMEOUT,
        )?;

        Ok(Self { http, base_url })
    }

    /// List executive orders signed within `[start_date, end_date]`, following
    /// `total_pages` pagination. Returns the raw listing records.
    pub async fn list_executive_orders(
        &self,
        start_date: &str,
        end_date: &str,
        max: Option<usize>,
    ) -> Result<Vec<Value>, ApiError> {
        if !validate_date_format(start_date) {
            return Err(ApiError::InvalidDate(start_date.to_string()));
        }
        if !validate_date_format(end_date) {
            return Err(ApiError::InvalidDate(end_date.to_string()));
        }

        let url = format!("{}/documents", self.base_url);
        let mut orders = Vec::new();
        let mut page: u64 = 1;

        loop {
            let mut params: Vec<(&str, String)> = vec![
                ("conditions[type]", "PRESDOCU".to_string()),
                (
                    "conditions[presidential_document_type]",
                    "executive_order".to_string(),
                ),
                ("conditions[signing_date][gte]", start_date.to_string()),
                ("conditions[signing_date][lte]", end_date.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            for field in LISTING_FIELDS {
                params.push(("fields[]", (*field).to_string()));
            }

            tracing::info!(page, "Fetching executive order listing page");
            let response = self.http.get(&url, &params).await?.error_for_status()?;
            let body: ListingPage = response.json().await?;

            if body.results.is_empty() {
                break;
            }

            for order in body.results {
                orders.push(order);
                if let Some(cap) = max {
                    if orders.len() >= cap {
                        return Ok(orders);
                    }
                }
            }

            let total_pages = body.total_pages.unwrap_or(1);
            tracing::info!(page, total_pages, orders = orders.len(), "Processed listing page");
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(orders)
    }

    /// Fetch the full metadata record for one executive order.
    pub async fn get_executive_order(&self, document_number: &str) -> Result<Value, ApiError> {
        let url = format!("{}/documents/{}", self.base_url, document_number);
        let response = self.http.get(&url, &[]).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Fetch and clean the raw text body behind a `raw_text_url`.
    pub async fn get_executive_order_text(&self, raw_text_url: &str) -> Result<String, ApiError> {
        let response = self.http.get(raw_text_url, &[]).await?.error_for_status()?;
        let body = response.text().await?;
        Ok(clean_raw_text(&body))
    }

    /// Normalize a raw order record into a flat metadata map.
    pub fn extract_basic_metadata(&self, order: &Value) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert(
            "document_number".into(),
            order.get("document_number").cloned().unwrap_or(Value::Null),
        );
        metadata.insert("title".into(), Value::String(json_str(order, "title")));
        metadata.insert(
            "executive_order_number".into(),
            order
                .get("executive_order_number")
                .cloned()
                .unwrap_or(Value::Null),
        );
        metadata.insert(
            "signing_date".into(),
            Value::String(json_str(order, "signing_date")),
        );
        metadata.insert(
            "president".into(),
            Value::String(president_name(order.get("president"))),
        );
        metadata.insert("citation".into(), Value::String(json_str(order, "citation")));
        metadata.insert("html_url".into(), Value::String(json_str(order, "html_url")));
        metadata.insert(
            "raw_text_url".into(),
            Value::String(json_str(order, "raw_text_url")),
        );
        metadata.insert(
            "publication_date".into(),
            Value::String(json_str(order, "publication_date")),
        );
        let agencies: Vec<Value> = order
            .get("agencies")
            .and_then(Value::as_array)
            .map(|agencies| {
                agencies
                    .iter()
                    .filter_map(|agency| agency.get("name").cloned())
                    .collect()
            })
            .unwrap_or_default();
        metadata.insert("agencies".into(), Value::Array(agencies));
        metadata
    }
}

#[async_trait]
impl GovernmentApi for FederalRegisterClient {
    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        let order = self.get_executive_order(id).await?;

        let raw_text_url = json_str(&order, "raw_text_url");
        let content = if raw_text_url.is_empty() {
            json_str(&order, "abstract")
        } else {
            self.get_executive_order_text(&raw_text_url).await?
        };

        let metadata = order
            .as_object()
            .cloned()
            .ok_or_else(|| ApiError::MalformedResponse("order record is not an object".into()))?;

        Ok(Document {
            id: id.to_string(),
            title: json_str(&order, "title"),
            date: json_str(&order, "signing_date"),
            doc_type: EO_DOC_TYPE.to_string(),
            source: FEDERAL_REGISTER_SOURCE.to_string(),
            content,
            url: json_str(&order, "html_url"),
            metadata,
        })
    }

    async fn get_document_text(&self, id: &str) -> Result<String, ApiError> {
        let order = self.get_executive_order(id).await?;
        let raw_text_url = json_str(&order, "raw_text_url");
        if raw_text_url.is_empty() {
            return Ok(json_str(&order, "abstract"));
        }
        self.get_executive_order_text(&raw_text_url).await
    }
}

/// Unwrap a `president` value that may be a `{name}` object or a plain string.
pub(crate) fn president_name(value: Option<&Value>) -> String {
    match value {
        Some(Value::Object(map)) => map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(name)) => name.clone(),
        _ => String::new(),
    }
}

/// Strip HTML wrapping from a raw-text body when present.
///
/// Bodies beginning with `<html>` carry the order text inside the first `<pre>` block,
/// with escaped entities and anchor tags that must be removed.
pub fn clean_raw_text(body: &str) -> String {
    static PRE_RE: OnceLock<Regex> = OnceLock::new();
    static ANCHOR_RE: OnceLock<Regex> = OnceLock::new();

    if !body.starts_with("<html>") {
        return body.trim().to_string();
    }

    let pre_re = PRE_RE.get_or_init(|| Regex::new(r"(?s)<pre>(.*?)</pre>").expect("pre regex"));
    let Some(captures) = pre_re.captures(body) else {
        return body.trim().to_string();
    };

    let mut text = captures[1].to_string();
    text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"");

    let anchor_re =
        ANCHOR_RE.get_or_init(|| Regex::new(r"(?s)<a[^>]*>.*?</a>").expect("anchor regex"));
    anchor_re.replace_all(&text, "").trim().to_string()
}
