//! Test doubles for the upload and registry services
//!
//! In-memory implementations of `Storage` and `UploadRepository` with failure
//! injection, plus recording observers and sinks. No database or network
//! access is needed, which makes them suitable for unit and integration tests.

pub mod memory_repository;
pub mod mock_storage;
pub mod recorders;

pub use memory_repository::InMemoryUploadRepository;
pub use mock_storage::MockStorage;
pub use recorders::{RecordingObserver, RecordingSaveAs};
