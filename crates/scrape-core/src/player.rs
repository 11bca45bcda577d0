//! Player shell consumer
//!
//! [`ScrapingPart`] is what a player screen mounts while it looks for a
//! stream: it starts exactly one session, exposes a render-ready view, and
//! forwards the outcome to callbacks unless it was unmounted first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::coordinator::{ScrapeSession, Scraper};
use crate::error::ScrapeError;
use crate::reporter::{summarize, TelemetrySink};
use crate::tracker::ScrapeSnapshot;
use crate::types::{RunOutput, ScrapeMedia, ScrapeResult, SourceDescriptor, SourceState};

/// Receives the final source states and registry order
pub type ResultCallback = Box<dyn FnOnce(HashMap<String, SourceState>, Vec<SourceDescriptor>) + Send>;

/// Receives the session result
pub type StreamCallback = Box<dyn FnOnce(ScrapeResult) + Send>;

/// What the player should draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ScrapingView {
    /// Registry not built yet
    Verifying,
    /// Probing; `current_index` is the provider to center on
    Scraping {
        snapshot: ScrapeSnapshot,
        current_index: usize,
    },
    /// A stream was found
    Found(RunOutput),
    /// Every source was tried without a stream
    NotFound,
    /// The session could not start; only a reload recovers
    Failed { message: String },
}

#[derive(Debug, Clone)]
enum Settled {
    Found(RunOutput),
    NotFound,
    Failed(String),
}

/// One mounted scraping screen
pub struct ScrapingPart {
    media: ScrapeMedia,
    session: ScrapeSession,
    telemetry: Arc<dyn TelemetrySink>,
    on_result: Mutex<Option<ResultCallback>>,
    on_get_stream: Mutex<Option<StreamCallback>>,
    started: AtomicBool,
    mounted: AtomicBool,
    settled: Mutex<Option<Settled>>,
}

impl ScrapingPart {
    /// Mount a part for `media` with a fresh session
    pub fn new(scraper: &Scraper, media: ScrapeMedia, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            media,
            session: scraper.session(),
            telemetry,
            on_result: Mutex::new(None),
            on_get_stream: Mutex::new(None),
            started: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            settled: Mutex::new(None),
        }
    }

    /// Called once with the final states and order
    pub fn on_result<F>(self, callback: F) -> Self
    where
        F: FnOnce(HashMap<String, SourceState>, Vec<SourceDescriptor>) + Send + 'static,
    {
        *lock(&self.on_result) = Some(Box::new(callback));
        self
    }

    /// Called once with the session result
    pub fn on_get_stream<F>(self, callback: F) -> Self
    where
        F: FnOnce(ScrapeResult) + Send + 'static,
    {
        *lock(&self.on_get_stream) = Some(Box::new(callback));
        self
    }

    /// The underlying session
    pub fn session(&self) -> &ScrapeSession {
        &self.session
    }

    /// Live snapshots for rendering
    pub fn subscribe(&self) -> watch::Receiver<ScrapeSnapshot> {
        self.session.subscribe()
    }

    /// Whether `unmount` has not been called
    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Run the session. Only the first call does anything.
    ///
    /// On settle, and only while mounted: `on_result`, then one metrics
    /// report, then `on_get_stream`. A session that fails to start moves the
    /// view to [`ScrapingView::Failed`] instead.
    pub async fn run(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let result = self.session.start_scraping(&self.media).await;
        if !self.is_mounted() {
            tracing::debug!(tmdb_id = %self.media.tmdb_id, "unmounted before settle, dropping result");
            return;
        }

        let result = match result {
            Ok(result) => result,
            Err(ScrapeError::Cancelled) => return,
            Err(e) => {
                *lock(&self.settled) = Some(Settled::Failed(e.to_string()));
                return;
            }
        };

        *lock(&self.settled) = Some(match &result {
            ScrapeResult::Found(out) => Settled::Found(out.clone()),
            ScrapeResult::Exhausted => Settled::NotFound,
        });

        let snapshot = self.session.snapshot();
        if let Some(callback) = self.take_if_mounted(&self.on_result) {
            callback(snapshot.sources.clone(), snapshot.source_order.clone());
        }
        if self.is_mounted() {
            self.telemetry
                .report(summarize(&self.media, &snapshot.source_order, &snapshot));
        }
        if let Some(callback) = self.take_if_mounted(&self.on_get_stream) {
            callback(result);
        }
    }

    /// Tear down: cancel the session and silence every callback
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        self.session.cancel();
    }

    /// Render state
    pub fn view(&self) -> ScrapingView {
        if let Some(settled) = lock(&self.settled).clone() {
            return match settled {
                Settled::Found(out) => ScrapingView::Found(out),
                Settled::NotFound => ScrapingView::NotFound,
                Settled::Failed(message) => ScrapingView::Failed { message },
            };
        }

        let snapshot = self.session.snapshot();
        match snapshot.current_provider_index() {
            Some(current_index) => ScrapingView::Scraping { snapshot, current_index },
            None => ScrapingView::Verifying,
        }
    }

    fn take_if_mounted<T>(&self, slot: &Mutex<Option<T>>) -> Option<T> {
        if !self.is_mounted() {
            return None;
        }
        lock(slot).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hints shown under the player while scraping
pub const TIPS: &[&str] = &[
    "Tap the gear icon to switch sources!",
    "Tap the title to copy the link!",
    "Hold SHIFT for widescreen instead of fullscreen!",
    "Some sources work better than others!",
    "Hold bookmarks to edit or delete them!",
    "Hold SHIFT and tap the title to copy the link with time!",
    "Set a custom subtitle color!",
    "Use [ and ] to adjust subtitle timing!",
    "Press SPACE or K to play/pause!",
    "Use LEFT and RIGHT arrow keys to skip 5 seconds!",
    "Use J and L keys to skip 10 seconds!",
    "Press F to toggle fullscreen!",
    "Press M to toggle mute!",
    "Use UP and DOWN arrows to change volume!",
    "Press < and > to change playback speed!",
    "Press . and , to move frame by frame when paused!",
    "Press C to toggle subtitles!",
];

/// Pick a tip; callers keep it for the lifetime of the screen
pub fn random_tip() -> &'static str {
    TIPS[rand::rng().random_range(0..TIPS.len())]
}
