//! Scrape Coordinator Tauri Integration
//!
//! This crate exposes the scrape coordinator to a Tauri 2.0 frontend. A
//! player screen calls `start_scraping`, listens for `scrape://update`
//! events to draw progress, and calls `stop_scraping` when it goes away.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scrape_tauri::ScrapeState;
//! use tauri::Manager;
//!
//! fn main() {
//!     scrape_tauri::init_logging();
//!     tauri::Builder::default()
//!         .setup(|app| {
//!             app.manage(ScrapeState::from_env()?);
//!             Ok(())
//!         })
//!         .invoke_handler(tauri::generate_handler![
//!             scrape_tauri::commands::start_scraping,
//!             scrape_tauri::commands::scrape_view,
//!             scrape_tauri::commands::stop_scraping,
//!             scrape_tauri::commands::scrape_tip,
//!         ])
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! # Commands
//! - `start_scraping` - Scrape a movie or episode, replacing any running session
//! - `scrape_view` - Current render state
//! - `stop_scraping` - Tear down the running session
//! - `scrape_tip` - A random hint for the loading screen

pub mod commands;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use scrape_core::{
    ClientConfig, HttpTelemetry, NoopTelemetry, ProviderClient, ScrapeConfig, ScrapeMedia, ScrapeSnapshot, Scraper,
    ScrapingPart, TelemetrySink,
};

/// Event carrying a `ScrapeSnapshot` on every tracker write
pub const UPDATE_EVENT: &str = "scrape://update";

/// Shared scraper plus the part currently mounted by the frontend.
///
/// # Example
/// ```rust,ignore
/// use scrape_tauri::ScrapeState;
/// use tauri::Manager;
///
/// tauri::Builder::default()
///     .setup(|app| {
///         app.manage(ScrapeState::from_env()?);
///         Ok(())
///     })
/// ```
pub struct ScrapeState {
    scraper: Scraper,
    telemetry: Arc<dyn TelemetrySink>,
    current: Mutex<Option<Arc<ScrapingPart>>>,
}

impl ScrapeState {
    /// Build from `SCRAPE_*` environment variables.
    ///
    /// # Errors
    /// Returns an error string if the HTTP client cannot be created.
    pub fn from_env() -> Result<Self, String> {
        Self::with_config(ClientConfig::from_env(), ScrapeConfig::from_env())
    }

    /// Build against the provider backend described by `client_config`.
    ///
    /// # Errors
    /// Returns an error string if the HTTP client cannot be created.
    pub fn with_config(client_config: ClientConfig, config: ScrapeConfig) -> Result<Self, String> {
        let telemetry: Arc<dyn TelemetrySink> = match &config.telemetry_url {
            Some(url) => {
                let client = ProviderClient::with_config(client_config.clone()).map_err(|e| e.to_string())?;
                Arc::new(HttpTelemetry::new(Arc::new(client), url.clone()))
            }
            None => Arc::new(NoopTelemetry),
        };
        let scraper = Scraper::http(client_config, config).map_err(|e| e.to_string())?;
        Ok(Self::new(scraper, telemetry))
    }

    /// Build from parts
    pub fn new(scraper: Scraper, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            scraper,
            telemetry,
            current: Mutex::new(None),
        }
    }

    /// Mount a part for `media`, unmounting whatever was running.
    pub async fn mount(&self, media: ScrapeMedia) -> Arc<ScrapingPart> {
        let part = Arc::new(ScrapingPart::new(&self.scraper, media, self.telemetry.clone()));
        if let Some(previous) = self.current.lock().await.replace(part.clone()) {
            previous.unmount();
        }
        part
    }

    /// Unmount the running part, if any
    pub async fn unmount(&self) {
        if let Some(part) = self.current.lock().await.take() {
            part.unmount();
        }
    }

    /// The mounted part
    pub async fn current(&self) -> Option<Arc<ScrapingPart>> {
        self.current.lock().await.clone()
    }
}

/// Run a mounted part, handing every snapshot to `emit`.
///
/// The settled snapshot is always the last one emitted.
pub async fn run_forwarding<F>(part: &ScrapingPart, emit: F)
where
    F: Fn(&ScrapeSnapshot) + Send + Sync + 'static,
{
    let emit = Arc::new(emit);
    let mut rx = part.subscribe();
    let forwarder = {
        let emit = emit.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                emit(&snapshot);
            }
        })
    };

    part.run().await;
    forwarder.abort();
    let _ = forwarder.await;
    emit(&part.session().snapshot());
}

/// Install a `tracing` subscriber honoring `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scrape_core::{
        EmbedDescriptor, MediaKind, Probe, Progress, ProviderEntry, ScrapingView, SourceDescriptor, SourceOutput,
        StaticCatalog, Status, Stream,
    };

    fn state() -> ScrapeState {
        let client = Arc::new(ProviderClient::new().unwrap());
        let scraper = Scraper::new(
            Arc::new(StaticCatalog::new(vec![])),
            Arc::new(scrape_core::HttpProbe::new(client)),
            ScrapeConfig::default(),
        );
        ScrapeState::new(scraper, Arc::new(NoopTelemetry))
    }

    #[tokio::test]
    async fn test_mount_replaces_and_unmounts_previous() {
        let state = state();
        let first = state.mount(ScrapeMedia::movie("1", "One", 2001)).await;
        let second = state.mount(ScrapeMedia::movie("2", "Two", 2002)).await;

        assert!(!first.is_mounted());
        assert!(first.session().is_cancelled());
        assert!(second.is_mounted());
        assert!(Arc::ptr_eq(&state.current().await.unwrap(), &second));

        state.unmount().await;
        assert!(!second.is_mounted());
        assert!(state.current().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_catalog_renders_failed() {
        let state = state();
        let part = state.mount(ScrapeMedia::movie("1", "One", 2001)).await;
        part.run().await;
        assert!(matches!(part.view(), ScrapingView::Failed { .. }));
    }

    struct DirectProbe;

    #[async_trait]
    impl Probe for DirectProbe {
        async fn probe_source(
            &self,
            _media: &ScrapeMedia,
            source: &SourceDescriptor,
            _progress: &Progress,
        ) -> scrape_core::Result<SourceOutput> {
            Ok(SourceOutput {
                stream: Stream::from_url(&format!("https://cdn.example/{}.m3u8", source.id)),
                embeds: vec![],
            })
        }

        async fn probe_embed(
            &self,
            _media: &ScrapeMedia,
            embed: &EmbedDescriptor,
            _url: &str,
            _progress: &Progress,
        ) -> scrape_core::Result<Stream> {
            Err(scrape_core::ScrapeError::NotFound(embed.id.clone()))
        }
    }

    #[tokio::test]
    async fn test_run_forwarding_ends_with_settled_snapshot() {
        let catalog = StaticCatalog::new(vec![ProviderEntry {
            id: "p1".to_string(),
            name: "P1".to_string(),
            rank: 1,
            media_types: vec![MediaKind::Movie],
            embeds: vec![],
            disabled: false,
        }]);
        let scraper = Scraper::new(Arc::new(catalog), Arc::new(DirectProbe), ScrapeConfig::default());
        let state = ScrapeState::new(scraper, Arc::new(NoopTelemetry));
        let part = state.mount(ScrapeMedia::movie("1", "One", 2001)).await;

        let emitted = Arc::new(std::sync::Mutex::new(Vec::new()));
        {
            let emitted = emitted.clone();
            run_forwarding(&part, move |snap: &ScrapeSnapshot| emitted.lock().unwrap().push(snap.clone())).await;
        }

        let emitted = emitted.lock().unwrap();
        let last = emitted.last().unwrap();
        assert_eq!(last, &part.session().snapshot());
        assert!(last.current_source.is_none());
        assert_eq!(last.status("p1"), Some(Status::Success));
        assert!(matches!(part.view(), ScrapingView::Found(_)));
    }

    #[test]
    fn test_with_config_without_telemetry() {
        let state = ScrapeState::with_config(ClientConfig::default(), ScrapeConfig::default());
        assert!(state.is_ok());
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
