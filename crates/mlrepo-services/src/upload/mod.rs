//! Upload coordination: staging, commit fan-out and completion notification.

pub mod coordinator;
pub mod observer;
pub mod types;

pub use coordinator::UploadCoordinator;
pub use observer::{RefreshSignal, UploadObserver};
pub use types::{
    CandidateFile, CommitSummary, FailureStage, FileOutcome, PendingFile, StageRejection,
    StageReport,
};
