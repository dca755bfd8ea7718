use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::FileCategory;
use crate::keys;

/// A persisted row of the `uploads` table.
///
/// Every record is backed by exactly one blob stored in `bucket` under
/// `{epoch_ms(uploaded_at)}-{file_name}`. Records are never updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: FileCategory,
    pub bucket: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Storage key of the blob backing this record.
    pub fn storage_key(&self) -> String {
        keys::storage_key(self.uploaded_at, &self.file_name)
    }
}

/// Insert payload for the `uploads` table (the id is assigned by the backend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUpload {
    pub file_name: String,
    pub file_type: FileCategory,
    pub bucket: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl NewUpload {
    pub fn storage_key(&self) -> String {
        keys::storage_key(self.uploaded_at, &self.file_name)
    }
}
