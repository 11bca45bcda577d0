//! Error types for the scrape coordinator
//!
//! This module defines all error types used throughout the library.
//! ScrapeError implements Serialize for Tauri compatibility.

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::types::Status;

/// Error type for scraping operations
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to parse a provider page or catalog payload
    #[error("Failed to parse: {0}")]
    ParseError(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Rate limited by the server (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Requested resource does not exist (HTTP 404 or an empty provider page)
    #[error("Not found: {0}")]
    NotFound(String),

    /// No sources could be enumerated for the request
    #[error("No sources available: {0}")]
    RegistryUnavailable(String),

    /// Media request failed validation
    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    /// Tracker was asked about an id it was never seeded with
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Tracker rejected a non-monotonic status change
    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Source or embed id
        id: String,
        /// Status the entry currently holds
        from: Status,
        /// Status that was requested
        to: Status,
    },

    /// A probe did not settle within the configured timeout
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// The session was torn down before it settled
    #[error("Scrape cancelled")]
    Cancelled,

    /// `start_scraping` was called twice on one session
    #[error("Scrape already started for this session")]
    AlreadyStarted,

    /// A probe reported a failure that is not a transport error
    #[error("Probe failed: {0}")]
    ProbeFailed(String),
}

impl ScrapeError {
    /// Whether this error means the content is absent rather than broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScrapeError::NotFound(_))
    }
}

/// Serialize ScrapeError as a string for Tauri compatibility
impl Serialize for ScrapeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for scraping operations
pub type Result<T> = std::result::Result<T, ScrapeError>;
