//! mlrepo core library
//!
//! Domain models, error types, configuration and validation shared by the
//! storage, database, service and CLI crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod keys;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BucketConfig, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileCategory, ListQuery, NewUpload, SortKey, TypeFilter, UploadRecord};
pub use storage_types::StorageBackend;
