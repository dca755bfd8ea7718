//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use mlrepo_core::AppError;
use std::sync::Arc;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Bytes transferred so far for a single upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

impl UploadProgress {
    /// Completion in percent (0-100). An empty payload counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.loaded.min(self.total) as f64 / self.total as f64) * 100.0
    }
}

/// Callback invoked as an upload proceeds.
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait so the
/// upload coordinator and the registry viewer never depend on a concrete
/// provider. Every operation is scoped to a bucket; backends reject buckets
/// they were not configured with.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload `data` to `bucket` under `key` and return the blob's public URL.
    ///
    /// `progress` is called at least once with the final byte count when the
    /// upload succeeds. Backends that can observe partial transfers report
    /// intermediate values too.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> StorageResult<String>;

    /// Download a blob
    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a blob
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Check if a blob exists
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Publicly reachable URL for a blob. Does not check that the blob exists.
    fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
