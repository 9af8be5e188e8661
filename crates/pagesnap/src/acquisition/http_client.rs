//! Async HTTP client wrapping reqwest.
//!
//! Plain HTTP requests, no browser. Every request carries its own
//! timeout and is attempted exactly once: a failed fetch is terminal for
//! that item.

use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Fetches raw asset bytes. Implemented by [`HttpClient`]; tests swap in
/// an in-memory table.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch `url`, failing on any non-2xx status.
    async fn fetch(&self, url: &str, timeout_ms: u64) -> Result<Vec<u8>, FetchError>;
}

/// HTTP client for robots.txt and asset downloads.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a new HTTP client identifying as `user_agent`.
    pub fn new(user_agent: &str, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Perform a single GET request and return the body as text.
    ///
    /// Any status is returned as-is; the caller decides what it means.
    pub async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse, FetchError> {
        let r = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| classify(e, timeout_ms))?;

        let status = r.status().as_u16();
        let body = r.text().await.map_err(|e| classify(e, timeout_ms))?;

        Ok(HttpResponse { status, body })
    }

    /// GET `url` and return the raw body, failing on any non-2xx status.
    pub async fn get_bytes(&self, url: &str, timeout_ms: u64) -> Result<Vec<u8>, FetchError> {
        let r = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| classify(e, timeout_ms))?;

        let status = r.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = r.bytes().await.map_err(|e| classify(e, timeout_ms))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AssetFetcher for HttpClient {
    async fn fetch(&self, url: &str, timeout_ms: u64) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url, timeout_ms).await
    }
}

fn classify(e: reqwest::Error, timeout_ms: u64) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(timeout_ms)
    } else {
        FetchError::Network(e.to_string())
    }
}
