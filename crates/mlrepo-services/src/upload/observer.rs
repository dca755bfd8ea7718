//! Commit notifications.
//!
//! The coordinator reports persisted files to its observers instead of sharing
//! a refresh counter with the registry view. [`RefreshSignal`] is the observer
//! the viewer listens on.

use mlrepo_core::models::UploadRecord;
use std::sync::Arc;
use tokio::sync::watch;

use super::types::CommitSummary;

/// Receives commit notifications from an `UploadCoordinator`.
pub trait UploadObserver: Send + Sync {
    /// Called after a commit in which at least one file was persisted.
    fn on_files_persisted(&self, records: &[UploadRecord]);

    /// Called after a commit in which every staged file was persisted.
    fn on_commit_finished(&self, _summary: &CommitSummary) {}
}

/// Generation counter bumped whenever uploads are persisted.
///
/// Cloning yields another handle to the same counter.
#[derive(Clone)]
pub struct RefreshSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl RefreshSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// A receiver that sees every bump made after this call.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn notify(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadObserver for RefreshSignal {
    fn on_files_persisted(&self, records: &[UploadRecord]) {
        tracing::debug!(count = records.len(), "Signalling registry refresh");
        self.notify();
    }
}
