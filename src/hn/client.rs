use crate::config::Config;
use crate::hn::item::{RawItem, StoryList};
use crate::hn::throttle::Throttle;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_LIST_SIZE: usize = 1024 * 1024; // 1MB, the top list is ~500 ids
const MAX_ITEM_SIZE: usize = 256 * 1024; // 256KB

/// Errors that can occur while talking to the upstream API.
///
/// Transient variants are retried by the client itself (see
/// [`FetchError::is_retryable`]); whatever reaches the caller has already
/// exhausted its retry budget.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-request timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit for its endpoint
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body was not the JSON shape the endpoint promises
    #[error("Malformed response: {0}")]
    Decode(String),
    /// The API answered `null`: the item does not exist (yet)
    #[error("Item {0} not found")]
    Missing(u64),
    /// The run deadline passed before this fetch completed
    #[error("Run deadline exceeded")]
    DeadlineExceeded,
}

impl FetchError {
    /// Returns true if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::IncompleteResponse { .. } => true,
            FetchError::Network(e) => !e.is_builder(),
            FetchError::HttpStatus(status) => *status >= 500 || *status == 429,
            FetchError::RateLimited(_)
            | FetchError::ResponseTooLarge
            | FetchError::Decode(_)
            | FetchError::Missing(_)
            | FetchError::DeadlineExceeded => false,
        }
    }
}

/// Client for the Hacker News Firebase API.
///
/// Cheap to share by reference across concurrent tasks: the underlying
/// `reqwest::Client` pools connections and the throttle is internally locked.
#[derive(Debug)]
pub struct HnClient {
    http: reqwest::Client,
    api_base: String,
    list: StoryList,
    request_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    throttle: Throttle,
}

impl HnClient {
    /// Builds a client from a validated [`Config`].
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::with_http_client(http, config))
    }

    /// Builds a client around an existing `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            list: config.list,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            throttle: Throttle::new(Duration::from_millis(config.min_request_interval_ms)),
        }
    }

    /// Fetches the ranked candidate list and returns at most `limit` ids in
    /// upstream order.
    ///
    /// Entries that are not non-negative integers are dropped. A body that is
    /// not a JSON array is a [`FetchError::Decode`].
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] left after retries. Callers treat this as fatal:
    /// without a candidate list there is nothing to build.
    pub async fn fetch_top_item_ids(&self, limit: usize) -> Result<Vec<u64>, FetchError> {
        let url = format!("{}/{}.json", self.api_base, self.list.endpoint());
        tracing::info!(url = %url, "Loading candidate ids");

        let bytes = self.get_with_retry(&url, MAX_LIST_SIZE).await?;
        let values: Vec<serde_json::Value> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        let total = values.len();
        let ids: Vec<u64> = values.iter().filter_map(serde_json::Value::as_u64).collect();
        if ids.len() < total {
            tracing::warn!(
                dropped = total - ids.len(),
                "Ignoring non-integer entries in candidate list"
            );
        }

        Ok(ids.into_iter().take(limit).collect())
    }

    /// Fetches one item's details.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Missing`] when the API answers `null`
    /// - [`FetchError::Decode`] when the body is not an item object
    /// - any transport/status error left after retries
    pub async fn fetch_item(&self, id: u64) -> Result<RawItem, FetchError> {
        let url = format!("{}/item/{}.json", self.api_base, id);
        tracing::trace!(id = id, url = %url, "Loading item");

        let bytes = self.get_with_retry(&url, MAX_ITEM_SIZE).await?;
        let item: Option<RawItem> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        item.ok_or(FetchError::Missing(id))
    }

    /// GET with exponential backoff on transient failures:
    /// `retry_backoff`, `2 * retry_backoff`, `4 * retry_backoff`, ...
    async fn get_with_retry(&self, url: &str, limit: usize) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            match self.get_once(url, limit).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && retry_count < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(1 << retry_count.min(16));
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient fetch error, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(FetchError::HttpStatus(429)) => {
                    return Err(FetchError::RateLimited(retry_count));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str, limit: usize) -> Result<Vec<u8>, FetchError> {
        self.throttle.acquire().await;

        // The timeout covers the body as well as the headers
        tokio::time::timeout(self.request_timeout, self.send_and_read(url, limit))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn send_and_read(&self, url: &str, limit: usize) -> Result<Vec<u8>, FetchError> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, limit).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: A connection dropped mid-body shows up as a short read
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
