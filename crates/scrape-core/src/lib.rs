//! Provider Scrape Coordinator
//!
//! This crate finds a playable stream for a movie or episode by trying
//! third-party providers one at a time, in rank order, and stopping at the
//! first success.
//!
//! # Features
//! - Per-session source registry built from a provider catalog
//! - Observable per-source status and progress via `tokio::sync::watch`
//! - Sequential, cancellable probing with a per-probe timeout
//! - Provider metrics summarized and posted after each session
//! - A player-shell consumer that renders progress and forwards the result
//! - Rate-limited HTTP client with retry for the provider backend

pub mod catalog;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod parser;
pub mod player;
pub mod probe;
pub mod registry;
pub mod reporter;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use catalog::{HttpCatalog, SourceCatalog, StaticCatalog};
pub use client::{ProviderClient, RateLimiter};
pub use config::{ClientConfig, ScrapeConfig};
pub use coordinator::{ScrapeSession, Scraper};
pub use error::{Result, ScrapeError};
pub use player::{random_tip, ScrapingPart, ScrapingView, TIPS};
pub use probe::{HttpProbe, Probe, Progress};
pub use registry::build_registry;
pub use reporter::{summarize, HttpTelemetry, MetricStatus, MetricsReport, NoopTelemetry, ProviderMetric, TelemetrySink};
pub use tracker::{ScrapeSnapshot, SourceTracker};
pub use types::{
    EmbedDescriptor, EmbedEntry, EmbedLink, EpisodeRef, MediaKind, ProviderEntry, RunOutput, ScrapeMedia,
    ScrapeResult, SourceDescriptor, SourceOutput, SourceState, Status, Stream, StreamKind,
};
