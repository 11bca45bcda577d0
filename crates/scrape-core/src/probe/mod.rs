//! Probe interface
//!
//! A probe is the I/O-bound capability that tries to turn one provider or
//! embed into a playable stream. The coordinator treats it as opaque.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tracker::SourceTracker;
use crate::types::{EmbedDescriptor, ScrapeMedia, SourceDescriptor, SourceOutput, Stream};

pub use http::HttpProbe;

/// Resolves providers and embeds for a media request.
///
/// Errors are classified by the coordinator: `ScrapeError::NotFound` marks
/// the source `notfound`, anything else marks it `failure`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe a top-level provider
    async fn probe_source(
        &self,
        media: &ScrapeMedia,
        source: &SourceDescriptor,
        progress: &Progress,
    ) -> Result<SourceOutput>;

    /// Probe one embed using the link its provider handed out
    async fn probe_embed(
        &self,
        media: &ScrapeMedia,
        embed: &EmbedDescriptor,
        url: &str,
        progress: &Progress,
    ) -> Result<Stream>;
}

/// Progress reporter for a single source id.
///
/// Reports after the session is torn down are dropped.
#[derive(Clone)]
pub struct Progress {
    id: String,
    tracker: Option<Arc<SourceTracker>>,
    token: CancellationToken,
}

impl Progress {
    pub(crate) fn new(id: &str, tracker: Arc<SourceTracker>, token: CancellationToken) -> Self {
        Self {
            id: id.to_string(),
            tracker: Some(tracker),
            token,
        }
    }

    /// A reporter that goes nowhere, for driving probes outside a session
    pub fn noop(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tracker: None,
            token: CancellationToken::new(),
        }
    }

    /// Id this reporter writes to
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record progress, 0-100
    pub fn report(&self, percentage: u8) {
        if self.token.is_cancelled() {
            return;
        }
        if let Some(tracker) = &self.tracker {
            if let Err(e) = tracker.set_percentage(&self.id, percentage) {
                tracing::debug!(id = %self.id, error = %e, "dropped progress report");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceDescriptor, Status};

    fn tracker() -> Arc<SourceTracker> {
        let tracker = Arc::new(SourceTracker::new());
        tracker
            .initialize(&[SourceDescriptor {
                id: "p1".to_string(),
                name: "P1".to_string(),
                children: vec![],
            }])
            .unwrap();
        tracker.set_status("p1", Status::Active, None).unwrap();
        tracker
    }

    #[test]
    fn test_progress_report() {
        let tracker = tracker();
        let progress = Progress::new("p1", tracker.clone(), CancellationToken::new());
        progress.report(40);
        assert_eq!(tracker.snapshot().get("p1").unwrap().percentage, 40);
        assert_eq!(progress.id(), "p1");
    }

    #[test]
    fn test_progress_inert_after_cancel() {
        let tracker = tracker();
        let token = CancellationToken::new();
        let progress = Progress::new("p1", tracker.clone(), token.clone());
        token.cancel();
        progress.report(70);
        assert_eq!(tracker.snapshot().get("p1").unwrap().percentage, 0);
    }

    #[test]
    fn test_noop_progress() {
        Progress::noop("x").report(10);
    }
}
