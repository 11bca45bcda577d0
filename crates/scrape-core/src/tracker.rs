//! Per-source status tracking
//!
//! The tracker owns the id → [`SourceState`] mapping of one session. Every
//! write replaces the published [`ScrapeSnapshot`] under the channel lock, so
//! observers holding a [`watch::Receiver`] never see a half-applied change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Result, ScrapeError};
use crate::types::{SourceDescriptor, SourceState, Status};

/// Everything a consumer needs to render a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSnapshot {
    /// Registry in probe order
    pub source_order: Vec<SourceDescriptor>,
    /// State of every provider and embed, keyed by id
    pub sources: HashMap<String, SourceState>,
    /// Source currently being probed
    pub current_source: Option<String>,
}

impl ScrapeSnapshot {
    /// State for one id
    pub fn get(&self, id: &str) -> Option<&SourceState> {
        self.sources.get(id)
    }

    /// Status for one id
    pub fn status(&self, id: &str) -> Option<Status> {
        self.sources.get(id).map(|s| s.status)
    }

    /// Index of the provider that is, or contains, the current source.
    ///
    /// Falls back to the last provider when nothing is current; `None` only
    /// when the registry is empty.
    pub fn current_provider_index(&self) -> Option<usize> {
        let last = self.source_order.len().checked_sub(1)?;
        let current = match self.current_source.as_deref() {
            Some(id) => id,
            None => return Some(last),
        };
        Some(
            self.source_order
                .iter()
                .position(|s| s.contains(current))
                .unwrap_or(last),
        )
    }
}

/// Mutable-by-coordinator, readable-by-consumer source state
pub struct SourceTracker {
    tx: watch::Sender<ScrapeSnapshot>,
    detached: AtomicBool,
}

impl Default for SourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceTracker {
    /// Empty tracker; nothing is tracked until `initialize`
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ScrapeSnapshot::default());
        Self {
            tx,
            detached: AtomicBool::new(false),
        }
    }

    /// Seed every provider and child id as `pending` at 0%.
    ///
    /// # Errors
    /// * `ScrapeError::AlreadyStarted` if the tracker was already seeded
    pub fn initialize(&self, registry: &[SourceDescriptor]) -> Result<()> {
        let mut outcome = Ok(());
        self.write(|snap| {
            if !snap.source_order.is_empty() {
                outcome = Err(ScrapeError::AlreadyStarted);
                return false;
            }
            for source in registry {
                snap.sources
                    .insert(source.id.clone(), SourceState::pending(&source.id, &source.name, None));
                for child in &source.children {
                    snap.sources.insert(
                        child.id.clone(),
                        SourceState::pending(&child.id, &child.name, Some(&child.embed_id)),
                    );
                }
            }
            snap.source_order = registry.to_vec();
            true
        });
        outcome
    }

    /// Transition one entry, optionally setting its percentage.
    ///
    /// Allowed: `pending → active`, `pending → terminal`, `active → terminal`.
    /// Repeating a non-terminal status is a no-op.
    ///
    /// # Errors
    /// * `ScrapeError::UnknownSource` for an id the tracker was not seeded with
    /// * `ScrapeError::InvalidTransition` for anything leaving a terminal state
    ///   or going back to `pending`
    pub fn set_status(&self, id: &str, status: Status, percentage: Option<u8>) -> Result<()> {
        self.transition(id, status, percentage, None)
    }

    /// Move an entry to a terminal status and record why
    ///
    /// # Errors
    /// * `ScrapeError::InvalidTransition` if `status` is not terminal, or the
    ///   entry already is
    /// * `ScrapeError::UnknownSource` for an id the tracker was not seeded with
    pub fn finish(&self, id: &str, status: Status, reason: Option<String>) -> Result<()> {
        if !status.is_terminal() {
            let from = self
                .snapshot()
                .status(id)
                .ok_or_else(|| ScrapeError::UnknownSource(id.to_string()))?;
            return Err(ScrapeError::InvalidTransition {
                id: id.to_string(),
                from,
                to: status,
            });
        }
        self.transition(id, status, None, reason)
    }

    /// Update an entry's progress. Terminal entries are left untouched.
    ///
    /// For an embed this also refreshes its provider's advisory aggregate.
    pub fn set_percentage(&self, id: &str, percentage: u8) -> Result<()> {
        let mut outcome = Ok(());
        self.write(|snap| {
            let Some(entry) = snap.sources.get_mut(id) else {
                outcome = Err(ScrapeError::UnknownSource(id.to_string()));
                return false;
            };
            if entry.status.is_terminal() {
                return false;
            }
            entry.percentage = percentage.min(100);
            refresh_parent(snap, id);
            true
        });
        outcome
    }

    /// Point `current_source` at an id, or clear it
    pub fn set_current(&self, id: Option<&str>) {
        self.write(|snap| {
            if snap.current_source.as_deref() == id {
                return false;
            }
            snap.current_source = id.map(str::to_string);
            true
        });
    }

    /// Consistent copy of the full state
    pub fn snapshot(&self) -> ScrapeSnapshot {
        self.tx.borrow().clone()
    }

    /// Live view; the receiver is notified after every write
    pub fn subscribe(&self) -> watch::Receiver<ScrapeSnapshot> {
        self.tx.subscribe()
    }

    /// Stop publishing. Later writes are dropped and the last snapshot stays.
    pub fn detach(&self) {
        self.tx.send_if_modified(|_| {
            self.detached.store(true, Ordering::SeqCst);
            false
        });
    }

    /// Whether `detach` has been called
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    fn transition(&self, id: &str, status: Status, percentage: Option<u8>, reason: Option<String>) -> Result<()> {
        let mut outcome = Ok(());
        self.write(|snap| {
            let Some(entry) = snap.sources.get_mut(id) else {
                outcome = Err(ScrapeError::UnknownSource(id.to_string()));
                return false;
            };
            let from = entry.status;
            let allowed = match (from, status) {
                (from, _) if from.is_terminal() => false,
                (Status::Active, Status::Pending) => false,
                _ => true,
            };
            if !allowed {
                outcome = Err(ScrapeError::InvalidTransition {
                    id: id.to_string(),
                    from,
                    to: status,
                });
                return false;
            }
            if from == status && percentage.is_none() {
                return false;
            }
            entry.status = status;
            if let Some(pct) = percentage {
                entry.percentage = pct.min(100);
            }
            if reason.is_some() {
                entry.reason = reason;
            }
            refresh_parent(snap, id);
            true
        });
        if let Err(e) = &outcome {
            tracing::warn!(%id, error = %e, "rejected tracker update");
        } else {
            tracing::trace!(%id, %status, "tracker update");
        }
        outcome
    }

    /// Apply `f` under the channel lock unless detached; `f` returns whether
    /// it changed anything worth publishing.
    fn write<F>(&self, f: F)
    where
        F: FnOnce(&mut ScrapeSnapshot) -> bool,
    {
        self.tx.send_if_modified(|snap| {
            if self.detached.load(Ordering::SeqCst) {
                return false;
            }
            f(snap)
        });
    }
}

/// Recompute a provider's percentage from its children, never lowering it.
fn refresh_parent(snap: &mut ScrapeSnapshot, child: &str) {
    let Some(parent) = snap
        .source_order
        .iter()
        .find(|s| s.child_ids().any(|c| c == child))
    else {
        return;
    };
    if parent.children.is_empty() {
        return;
    }
    let total: u32 = parent
        .child_ids()
        .filter_map(|c| snap.sources.get(c))
        .map(|s| if s.status.is_terminal() { 100 } else { u32::from(s.percentage) })
        .sum();
    let mean = (total / parent.children.len() as u32).min(100) as u8;
    let parent_id = parent.id.clone();
    if let Some(entry) = snap.sources.get_mut(&parent_id) {
        if !entry.status.is_terminal() && mean > entry.percentage {
            entry.percentage = mean;
        }
    }
}
