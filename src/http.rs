//! Rate-limited HTTP client shared by the government API adapters.
//!
//! Every adapter owns one [`RateLimitedClient`], which enforces two policies on its behalf:
//!
//! - A per-client minimum delay between successive outbound requests, so concurrent fetchers
//!   through the same adapter share a single rate budget.
//! - Bounded exponential backoff (jitter-free doubling from a configured initial delay) on
//!   transport errors and on HTTP 429/5xx responses.
//!
//! Permanent HTTP errors (4xx other than 429) are returned to the caller as regular responses;
//! adapters decide how to surface them.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// User-Agent header sent on every outbound request.
pub const USER_AGENT: &str = "GovernmentReporter/0.1.0";

/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longer timeout used for paginated listing walks.
pub const PAGINATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors raised by the rate-limited HTTP client.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The HTTP layer failed before receiving a response, after all retries.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server kept returning a retryable status until retries ran out.
    #[error("Request to {url} failed with status {status} after {attempts} attempts")]
    RetriesExhausted {
        /// URL of the failing request.
        url: String,
        /// Last retryable status observed.
        status: StatusCode,
        /// Total attempts made, including the first.
        attempts: u32,
    },
}

/// HTTP GET client with a per-client rate budget and retry policy.
pub struct RateLimitedClient {
    client: Client,
    min_delay: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedClient {
    /// Construct a client with the given rate budget and retry policy.
    ///
    /// `default_headers` typically carries authentication; the User-Agent is always
    /// [`USER_AGENT`].
    pub fn new(
        min_delay: Duration,
        max_retries: u32,
        initial_backoff: Duration,
        default_headers: HeaderMap,
        timeout: Duration,
    ) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            min_delay,
            max_retries,
            initial_backoff,
            last_request: Mutex::new(None),
        })
    }

    /// Perform a GET request, honoring the rate budget and retrying retryable failures.
    ///
    /// Returns the response for any non-retryable status; callers apply their own
    /// `error_for_status` policy.
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Response, HttpClientError> {
        self.get_with_timeout(url, query, None).await
    }

    /// Like [`get`](Self::get), with a per-request timeout override (pagination walks
    /// use a longer budget than single-document fetches).
    pub async fn get_with_timeout(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Response, HttpClientError> {
        let mut backoff = self.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.wait_for_rate_budget().await;

            let mut request = self.client.get(url).query(query);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) {
                        return Ok(response);
                    }
                    if attempt > self.max_retries {
                        return Err(HttpClientError::RetriesExhausted {
                            url: url.to_string(),
                            status,
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(
                        url,
                        status = status.as_u16(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retryable HTTP status; backing off"
                    );
                }
                Err(error) => {
                    if attempt > self.max_retries {
                        return Err(HttpClientError::Transport(error));
                    }
                    tracing::warn!(
                        url,
                        error = %error,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transport error; backing off"
                    );
                }
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    /// Sleep until the minimum inter-request delay since the previous request has elapsed.
    async fn wait_for_rate_budget(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    fn test_client(min_delay_ms: u64, max_retries: u32) -> RateLimitedClient {
        RateLimitedClient::new(
            Duration::from_millis(min_delay_ms),
            max_retries,
            Duration::from_millis(10),
            HeaderMap::new(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn successive_requests_respect_minimum_delay() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ok");
                then.status(200).body("{}");
            })
            .await;

        let client = test_client(100, 0);
        let url = server.url("/ok");

        let started = std::time::Instant::now();
        client.get(&url, &[]).await.expect("first request");
        client.get(&url, &[]).await.expect("second request");
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retries_exhaust_on_persistent_rate_limiting() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/limited");
                then.status(429);
            })
            .await;

        let client = test_client(0, 2);
        let error = client
            .get(&server.url("/limited"), &[])
            .await
            .expect_err("should exhaust retries");

        match error {
            HttpClientError::RetriesExhausted {
                status, attempts, ..
            } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.hits(), 3);
    }

    #[tokio::test]
    async fn permanent_client_errors_are_returned_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let client = test_client(0, 3);
        let response = client
            .get(&server.url("/missing"), &[])
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(mock.hits(), 1);
    }
}
