//! Error types module
//!
//! All errors raised by the upload coordinator and the registry viewer are
//! unified under `AppError`. Variants are grouped by where they originate:
//! local validation (never touches the network), object storage, the metadata
//! table, and cross-store consistency.
//!
//! The `Database` variant carries a `sqlx::Error` only when the `sqlx` feature
//! is enabled; without it the variant holds the rendered message.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::FileCategory;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues the user can act on
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be surfaced to the user.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "STORAGE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same operation may succeed
    fn is_recoverable(&self) -> bool;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid file type: {file_name}. Please select a valid {category} file")]
    InvalidFileType {
        file_name: String,
        category: FileCategory,
    },

    #[error("File too large: {file_name} is {size} bytes, limit is {limit} bytes")]
    PayloadTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("No files selected for upload")]
    EmptyBatch,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Blob {bucket}/{key} was removed but its metadata row could not be deleted: {reason}")]
    OrphanedBlob {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl AppError {
    /// True for errors raised before any I/O was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidFileType { .. }
                | AppError::PayloadTooLarge { .. }
                | AppError::EmptyBatch
                | AppError::InvalidInput(_)
        )
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::Database(_) => ("DATABASE_ERROR", true, LogLevel::Error),
        AppError::Storage(_) => ("STORAGE_ERROR", true, LogLevel::Error),
        AppError::InvalidFileType { .. } => ("INVALID_FILE_TYPE", false, LogLevel::Debug),
        AppError::PayloadTooLarge { .. } => ("PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        AppError::EmptyBatch => ("EMPTY_BATCH", false, LogLevel::Debug),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::OrphanedBlob { .. } => ("ORPHANED_BLOB", false, LogLevel::Error),
        AppError::Internal(_) => ("INTERNAL_ERROR", false, LogLevel::Error),
        AppError::InternalWithSource { .. } => ("INTERNAL_ERROR", false, LogLevel::Error),
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to reach the file registry".to_string(),
            AppError::Storage(msg) => format!("Storage request failed: {}", msg),
            AppError::InvalidFileType {
                file_name,
                category,
            } => format!(
                "Invalid file type: {}. Please select a valid {} file ({})",
                file_name,
                category,
                category.allowed_extensions_hint()
            ),
            AppError::PayloadTooLarge {
                file_name, limit, ..
            } => format!(
                "{} exceeds the maximum upload size of {} MB",
                file_name,
                limit / 1024 / 1024
            ),
            AppError::EmptyBatch => "Please select files to upload".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::OrphanedBlob { key, .. } => format!(
                "File {} was removed from storage but its registry entry could not be deleted",
                key
            ),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "An internal error occurred".to_string()
            }
        }
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }
}
