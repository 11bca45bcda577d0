//! Scrape coordinator
//!
//! Walks a session registry in order, one provider at a time, and stops at
//! the first playable stream. Per-source failures are absorbed into the
//! tracker; only pre-flight faults reach the caller.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::{HttpCatalog, SourceCatalog};
use crate::client::ProviderClient;
use crate::config::{ClientConfig, ScrapeConfig};
use crate::error::{Result, ScrapeError};
use crate::probe::{HttpProbe, Probe, Progress};
use crate::registry::build_registry;
use crate::tracker::{ScrapeSnapshot, SourceTracker};
use crate::types::{RunOutput, ScrapeMedia, ScrapeResult, SourceDescriptor, Status};

/// Session factory holding the catalog and probe
///
/// # Example
/// ```no_run
/// use scrape_core::{ClientConfig, ScrapeConfig, ScrapeMedia, Scraper};
///
/// # async fn example() -> Result<(), scrape_core::ScrapeError> {
/// let scraper = Scraper::http(ClientConfig::from_env(), ScrapeConfig::from_env())?;
/// let session = scraper.session();
/// let result = session
///     .start_scraping(&ScrapeMedia::movie("27205", "Inception", 2010))
///     .await?;
/// println!("{:?}", result.output().map(|o| &o.stream.url));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scraper {
    catalog: Arc<dyn SourceCatalog>,
    probe: Arc<dyn Probe>,
    config: ScrapeConfig,
}

impl Scraper {
    /// Build from any catalog and probe
    pub fn new(catalog: Arc<dyn SourceCatalog>, probe: Arc<dyn Probe>, config: ScrapeConfig) -> Self {
        Self { catalog, probe, config }
    }

    /// Catalog and probe backed by the provider backend, sharing one client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn http(client_config: ClientConfig, config: ScrapeConfig) -> Result<Self> {
        let client = Arc::new(ProviderClient::with_config(client_config)?);
        Ok(Self::new(
            Arc::new(HttpCatalog::new(client.clone())),
            Arc::new(HttpProbe::new(client)),
            config,
        ))
    }

    /// Session settings
    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Fresh single-shot session
    pub fn session(&self) -> ScrapeSession {
        ScrapeSession {
            catalog: self.catalog.clone(),
            probe: self.probe.clone(),
            probe_timeout: self.config.probe_timeout(),
            tracker: Arc::new(SourceTracker::new()),
            token: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }
}

/// One end-to-end scrape attempt for one media request
pub struct ScrapeSession {
    catalog: Arc<dyn SourceCatalog>,
    probe: Arc<dyn Probe>,
    probe_timeout: Duration,
    tracker: Arc<SourceTracker>,
    token: CancellationToken,
    started: AtomicBool,
}

impl ScrapeSession {
    /// Live snapshots, updated on every tracker write
    pub fn subscribe(&self) -> watch::Receiver<ScrapeSnapshot> {
        self.tracker.subscribe()
    }

    /// Current state of every source
    pub fn snapshot(&self) -> ScrapeSnapshot {
        self.tracker.snapshot()
    }

    /// Source being probed right now
    pub fn current_source(&self) -> Option<String> {
        self.tracker.snapshot().current_source
    }

    /// Tear the session down: stop probing, freeze the tracker
    pub fn cancel(&self) {
        self.tracker.detach();
        self.token.cancel();
    }

    /// Whether `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token that cancels this session when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run the session to completion.
    ///
    /// # Returns
    /// * `Ok(ScrapeResult::Found)` with the first playable stream
    /// * `Ok(ScrapeResult::Exhausted)` when every source was tried
    ///
    /// # Errors
    /// * `ScrapeError::AlreadyStarted` on a second call
    /// * `ScrapeError::InvalidMedia` if the request fails validation
    /// * `ScrapeError::RegistryUnavailable` if no sources can be enumerated
    /// * `ScrapeError::Cancelled` if the session is torn down first
    pub async fn start_scraping(&self, media: &ScrapeMedia) -> Result<ScrapeResult> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ScrapeError::AlreadyStarted);
        }
        if self.token.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        media.validate()?;

        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.tracker.detach();
                Err(ScrapeError::Cancelled)
            }
            res = self.run(media) => res,
        };

        match &result {
            Ok(ScrapeResult::Found(out)) => tracing::info!(
                tmdb_id = %media.tmdb_id,
                source = %out.source_id,
                embed = ?out.embed_id,
                "stream found"
            ),
            Ok(ScrapeResult::Exhausted) => {
                tracing::info!(tmdb_id = %media.tmdb_id, "all sources exhausted")
            }
            Err(ScrapeError::Cancelled) => tracing::debug!(tmdb_id = %media.tmdb_id, "scrape cancelled"),
            Err(e) => tracing::warn!(tmdb_id = %media.tmdb_id, error = %e, "scrape failed to start"),
        }
        result
    }

    async fn run(&self, media: &ScrapeMedia) -> Result<ScrapeResult> {
        let catalog = self.catalog.list_providers().await.map_err(|e| match e {
            ScrapeError::RegistryUnavailable(_) => e,
            other => ScrapeError::RegistryUnavailable(other.to_string()),
        })?;
        let registry = build_registry(media, &catalog)?;
        self.tracker.initialize(&registry)?;
        tracing::debug!(sources = registry.len(), "registry built");

        for source in &registry {
            if let Some(output) = self.run_source(media, source).await? {
                self.tracker.set_current(None);
                return Ok(ScrapeResult::Found(output));
            }
        }

        self.tracker.set_current(None);
        Ok(ScrapeResult::Exhausted)
    }

    /// Probe one provider and, if needed, its embeds.
    async fn run_source(&self, media: &ScrapeMedia, source: &SourceDescriptor) -> Result<Option<RunOutput>> {
        self.tracker.set_status(&source.id, Status::Active, None)?;
        self.tracker.set_current(Some(&source.id));

        let progress = Progress::new(&source.id, self.tracker.clone(), self.token.clone());
        let output = match self.bounded(self.probe.probe_source(media, source, &progress)).await {
            Ok(output) => output,
            Err(e) => {
                let status = self.settle_failed(&source.id, e)?;
                let reason = if status == Status::NotFound {
                    "not offered by source"
                } else {
                    "provider failed"
                };
                self.settle_children(source, status, reason)?;
                return Ok(None);
            }
        };

        if let Some(stream) = output.stream {
            self.tracker.finish(&source.id, Status::Success, None)?;
            return Ok(Some(RunOutput {
                source_id: source.id.clone(),
                embed_id: None,
                stream,
            }));
        }

        if output.embeds.is_empty() {
            self.tracker
                .finish(&source.id, Status::NotFound, Some("no stream or embeds".to_string()))?;
            self.settle_children(source, Status::NotFound, "not offered by source")?;
            return Ok(None);
        }

        let mut probed = 0usize;
        for child in &source.children {
            let Some(link) = output.embeds.iter().find(|l| l.embed_id == child.embed_id) else {
                self.tracker
                    .finish(&child.id, Status::NotFound, Some("not offered by source".to_string()))?;
                continue;
            };

            probed += 1;
            self.tracker.set_status(&child.id, Status::Active, None)?;
            self.tracker.set_current(Some(&child.id));

            let progress = Progress::new(&child.id, self.tracker.clone(), self.token.clone());
            match self
                .bounded(self.probe.probe_embed(media, child, &link.url, &progress))
                .await
            {
                Ok(stream) => {
                    self.tracker.finish(&child.id, Status::Success, None)?;
                    self.tracker.finish(&source.id, Status::Success, None)?;
                    return Ok(Some(RunOutput {
                        source_id: source.id.clone(),
                        embed_id: Some(child.embed_id.clone()),
                        stream,
                    }));
                }
                Err(e) => {
                    self.settle_failed(&child.id, e)?;
                }
            }
        }

        if probed == 0 {
            self.tracker
                .finish(&source.id, Status::NotFound, Some("no supported embeds".to_string()))?;
        } else {
            self.tracker
                .finish(&source.id, Status::Failure, Some("all embeds failed".to_string()))?;
        }
        Ok(None)
    }

    /// Apply the probe timeout
    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.probe_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ScrapeError::Timeout(self.probe_timeout.as_secs())),
        }
    }

    /// Record a probe error as `notfound` or `failure`
    fn settle_failed(&self, id: &str, error: ScrapeError) -> Result<Status> {
        let status = if error.is_not_found() {
            Status::NotFound
        } else {
            Status::Failure
        };
        tracing::debug!(%id, %status, %error, "source settled without stream");
        self.tracker.finish(id, status, Some(error.to_string()))?;
        Ok(status)
    }

    /// Close out every unsettled embed of a provider that will not be probed further
    fn settle_children(&self, source: &SourceDescriptor, status: Status, reason: &str) -> Result<()> {
        let snapshot = self.tracker.snapshot();
        for child in &source.children {
            if snapshot.status(&child.id).is_some_and(|s| s.is_terminal()) {
                continue;
            }
            self.tracker.finish(&child.id, status, Some(reason.to_string()))?;
        }
        Ok(())
    }
}
