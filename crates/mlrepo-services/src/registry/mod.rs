//! File registry: listing, download and delete of persisted uploads.

pub mod types;
pub mod viewer;

pub use types::{DeleteConfirmation, DeleteOutcome, DownloadTicket, SaveAs};
pub use viewer::FileRegistryViewer;
