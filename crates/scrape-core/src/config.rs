//! Configuration for the provider client and scrape sessions
//!
//! Both configs have sensible defaults and can be overridden from the
//! environment with `from_env`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default provider backend
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

/// Configuration for the provider HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Provider backend root, without trailing slash
    pub base_url: String,
    /// Maximum requests per second (default: 4.0)
    pub requests_per_second: f64,
    /// Request timeout in seconds (default: 15)
    pub timeout_secs: u64,
    /// Retries on 429/5xx before giving up (default: 3)
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_second: 4.0,
            timeout_secs: 15,
            max_retries: 3,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `SCRAPE_BASE_URL`, `SCRAPE_REQUESTS_PER_SECOND`
    /// and `SCRAPE_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = env_var("SCRAPE_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(rps) = env_parse::<f64>("SCRAPE_REQUESTS_PER_SECOND").filter(|r| *r > 0.0) {
            config.requests_per_second = rps;
        }
        if let Some(secs) = env_parse("SCRAPE_TIMEOUT_SECS") {
            config.timeout_secs = secs;
        }
        config
    }

    /// Base URL with a fixed host, for tests and embedding
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

/// Configuration for scrape sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Upper bound on a single source or embed probe (default: 20)
    pub probe_timeout_secs: u64,
    /// Where provider metrics are posted; `None` disables reporting
    pub telemetry_url: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 20,
            telemetry_url: None,
        }
    }
}

impl ScrapeConfig {
    /// Defaults overridden by `SCRAPE_PROBE_TIMEOUT_SECS` and `SCRAPE_TELEMETRY_URL`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<u64>("SCRAPE_PROBE_TIMEOUT_SECS").filter(|s| *s > 0) {
            config.probe_timeout_secs = secs;
        }
        config.telemetry_url = env_var("SCRAPE_TELEMETRY_URL");
        config
    }

    /// Probe timeout as a Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_var(key).and_then(|v| v.trim().parse().ok())
}
