//! HTTP client with rate limiting for the provider backend
//!
//! This module provides a rate-limited HTTP client shared by the HTTP
//! catalog, probe and telemetry sink. Transient errors (429, 5xx) are
//! retried with exponential backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{Result, ScrapeError};

/// Default User-Agent mimicking a modern browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base delay for exponential backoff (in milliseconds)
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Rate limiter to control request frequency
///
/// Ensures that requests are spaced at least `min_interval` apart
/// so a single session cannot hammer provider hosts.
pub struct RateLimiter {
    /// Minimum interval between requests
    min_interval: Duration,
    /// Timestamp of the last request
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    ///
    /// # Example
    /// ```
    /// use scrape_core::client::RateLimiter;
    ///
    /// let limiter = RateLimiter::new(2.0); // 2 requests per second
    /// ```
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = Duration::from_secs_f64(1.0 / requests_per_second);
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(Instant::now() - min_interval)),
        }
    }

    /// Acquire permission to make a request
    ///
    /// Waits if necessary so the minimum interval between requests holds.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            let wait_time = self.min_interval - elapsed;
            sleep(wait_time).await;
        }

        *last = Instant::now();
    }

    /// Get the minimum interval between requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// HTTP client for the provider backend with rate limiting and retry logic
pub struct ProviderClient {
    /// Underlying HTTP client
    client: reqwest::Client,
    /// Rate limiter for request throttling
    rate_limiter: RateLimiter,
    /// Backend root used for relative paths
    base_url: String,
    /// Retries on transient errors
    max_retries: u32,
}

impl ProviderClient {
    /// Create a new client with default configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_second),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Backend root, without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path or absolute URL against the backend root
    ///
    /// # Errors
    /// * `ScrapeError::InvalidUrl` for empty input or a non-http scheme
    pub fn resolve(&self, path_or_url: &str) -> Result<String> {
        let target = path_or_url.trim();
        if target.is_empty() {
            return Err(ScrapeError::InvalidUrl("empty url".to_string()));
        }
        if target.starts_with("http://") || target.starts_with("https://") {
            return Ok(target.to_string());
        }
        if target.contains("://") {
            return Err(ScrapeError::InvalidUrl(target.to_string()));
        }
        if target.starts_with('/') {
            Ok(format!("{}{}", self.base_url, target))
        } else {
            Ok(format!("{}/{}", self.base_url, target))
        }
    }

    /// Fetch a page body from a backend path or absolute URL
    ///
    /// # Errors
    /// - `ScrapeError::HttpError` - Network or HTTP error after all retries
    /// - `ScrapeError::RateLimited` - Server returned 429 after all retries
    /// - `ScrapeError::NotFound` - Server returned 404
    pub async fn fetch(&self, path_or_url: &str) -> Result<String> {
        let url = self.resolve(path_or_url)?;
        self.fetch_with_retry(&url, 0).await
    }

    /// Fetch and decode a JSON body
    pub async fn fetch_json<T: serde::de::DeserializeOwned>(&self, path_or_url: &str) -> Result<T> {
        let body = self.fetch(path_or_url).await?;
        serde_json::from_str(&body).map_err(|e| ScrapeError::ParseError(e.to_string()))
    }

    /// POST a JSON body, single attempt
    pub async fn post_json<T: Serialize + ?Sized>(&self, path_or_url: &str, body: &T) -> Result<()> {
        let url = self.resolve(path_or_url)?;
        self.rate_limiter.acquire().await;
        self.client
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Internal method to fetch with retry logic
    fn fetch_with_retry<'a>(
        &'a self,
        url: &'a str,
        attempt: u32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.rate_limiter.acquire().await;

            let response = self.client.get(url).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response.text().await?);
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScrapeError::NotFound(url.to_string()));
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.max_retries {
                    let delay = self.calculate_backoff_delay(attempt);
                    tracing::debug!(%url, attempt, ?delay, "rate limited, backing off");
                    sleep(delay).await;
                    return self.fetch_with_retry(url, attempt + 1).await;
                }
                return Err(ScrapeError::RateLimited);
            }

            if status.is_server_error() && attempt < self.max_retries {
                let delay = self.calculate_backoff_delay(attempt);
                tracing::debug!(%url, attempt, %status, ?delay, "server error, retrying");
                sleep(delay).await;
                return self.fetch_with_retry(url, attempt + 1).await;
            }

            match response.error_for_status() {
                Err(e) => Err(ScrapeError::HttpError(e)),
                Ok(_) => Err(ScrapeError::ProbeFailed(format!("unexpected status {status} from {url}"))),
            }
        })
    }

    /// Calculate exponential backoff delay for retry
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        // 1s, 2s, 4s, ...
        let delay_ms = BASE_RETRY_DELAY_MS * 2u64.pow(attempt);
        Duration::from_millis(delay_ms)
    }

    /// Get a reference to the rate limiter (for testing)
    #[cfg(test)]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
