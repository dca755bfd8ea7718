//! Recording observers and download sinks

use async_trait::async_trait;
use mlrepo_core::models::UploadRecord;
use mlrepo_core::AppError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::registry::{DownloadTicket, SaveAs};
use crate::upload::{CommitSummary, UploadObserver};

/// Counts commit notifications.
#[derive(Default)]
pub struct RecordingObserver {
    persisted_batches: AtomicUsize,
    last_persisted_count: AtomicUsize,
    finished_commits: AtomicUsize,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted_batches(&self) -> usize {
        self.persisted_batches.load(Ordering::SeqCst)
    }

    pub fn last_persisted_count(&self) -> usize {
        self.last_persisted_count.load(Ordering::SeqCst)
    }

    pub fn finished_commits(&self) -> usize {
        self.finished_commits.load(Ordering::SeqCst)
    }
}

impl UploadObserver for RecordingObserver {
    fn on_files_persisted(&self, records: &[UploadRecord]) {
        self.persisted_batches.fetch_add(1, Ordering::SeqCst);
        self.last_persisted_count
            .store(records.len(), Ordering::SeqCst);
    }

    fn on_commit_finished(&self, _summary: &CommitSummary) {
        self.finished_commits.fetch_add(1, Ordering::SeqCst);
    }
}

/// `SaveAs` sink that keeps the tickets it was handed.
#[derive(Default)]
pub struct RecordingSaveAs {
    tickets: Mutex<Vec<DownloadTicket>>,
    fail: AtomicBool,
}

impl RecordingSaveAs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn tickets(&self) -> Vec<DownloadTicket> {
        self.tickets.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaveAs for RecordingSaveAs {
    async fn save(&self, ticket: &DownloadTicket) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("injected save failure".to_string()));
        }
        self.tickets.lock().unwrap().push(ticket.clone());
        Ok(())
    }
}
