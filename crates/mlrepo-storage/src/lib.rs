//! mlrepo Storage Library
//!
//! Object storage abstraction for uploaded models and datasets, with an S3
//! implementation (any S3-compatible provider) and a local filesystem one.
//!
//! # Buckets and keys
//!
//! Every blob lives in one of the configured buckets (one per file category)
//! under a key of the form `{epoch_ms}-{file_name}`. Keys must not contain `..`
//! or a leading `/`; validation is centralized in the `keys` module so all
//! backends agree on what they accept.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mlrepo_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ProgressFn, Storage, StorageError, StorageResult, UploadProgress};
