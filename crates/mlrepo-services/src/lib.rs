//! mlrepo services
//!
//! The two workflows of the model and dataset registry:
//!
//! - [`upload::UploadCoordinator`] stages files, uploads them to object storage and
//!   records their metadata, compensating with a blob delete when the insert fails.
//! - [`registry::FileRegistryViewer`] lists, downloads and deletes persisted uploads.
//!
//! Both depend only on the [`Storage`] and [`UploadRepository`] traits.

pub mod registry;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod upload;

pub use mlrepo_db::UploadRepository;
pub use mlrepo_storage::{Storage, StorageBackend, StorageError, StorageResult};
pub use registry::{
    DeleteConfirmation, DeleteOutcome, DownloadTicket, FileRegistryViewer, SaveAs,
};
pub use upload::{
    CandidateFile, CommitSummary, FailureStage, FileOutcome, PendingFile, RefreshSignal,
    StageRejection, StageReport, UploadCoordinator, UploadObserver,
};
