use bytes::Bytes;
use mlrepo_core::models::{FileCategory, UploadRecord};
use mlrepo_core::AppError;
use std::fmt;
use uuid::Uuid;

/// A file offered for staging: its client-side name and content.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub data: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A staged file waiting for commit.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub local_id: Uuid,
    pub file_name: String,
    pub data: Bytes,
    pub category: FileCategory,
}

impl PendingFile {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A candidate that was refused at staging time.
#[derive(Debug)]
pub struct StageRejection {
    pub file_name: String,
    pub category: FileCategory,
    pub error: AppError,
}

/// Result of one `stage` call.
#[derive(Debug, Default)]
pub struct StageReport {
    /// Local ids of the files added to the batch, in input order.
    pub accepted: Vec<Uuid>,
    pub rejected: Vec<StageRejection>,
}

/// Where a file's commit sequence stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The blob upload failed; nothing was written.
    Upload,
    /// The blob was uploaded but the metadata insert failed.
    /// `blob_removed` tells whether the compensating delete succeeded.
    Insert { blob_removed: bool },
}

/// Outcome of committing one staged file.
#[derive(Debug)]
pub enum FileOutcome {
    Persisted {
        local_id: Uuid,
        record: UploadRecord,
    },
    Failed {
        local_id: Uuid,
        file_name: String,
        stage: FailureStage,
        error: AppError,
    },
}

impl FileOutcome {
    pub fn local_id(&self) -> Uuid {
        match self {
            FileOutcome::Persisted { local_id, .. } | FileOutcome::Failed { local_id, .. } => {
                *local_id
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Persisted { .. })
    }
}

/// Aggregate result of a commit.
#[derive(Debug)]
pub struct CommitSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// One entry per staged file, in batch order.
    pub outcomes: Vec<FileOutcome>,
}

impl CommitSummary {
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.attempted
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    /// Records created by this commit.
    pub fn persisted(&self) -> Vec<UploadRecord> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                FileOutcome::Persisted { record, .. } => Some(record.clone()),
                FileOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} files uploaded successfully",
            self.succeeded, self.attempted
        )
    }
}
