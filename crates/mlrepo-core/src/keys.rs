//! Storage key derivation.
//!
//! Key format: `{epoch_ms}-{file_name}`, where `epoch_ms` is the upload timestamp in
//! milliseconds since the Unix epoch. Upload, download and delete all derive the key
//! through [`storage_key`], so a record always points at the blob it was created with.

use chrono::{DateTime, TimeZone, Utc};

/// Build the storage key for a blob uploaded at `uploaded_at` under `file_name`.
pub fn storage_key(uploaded_at: DateTime<Utc>, file_name: &str) -> String {
    format!("{}-{}", uploaded_at.timestamp_millis(), file_name)
}

/// Drop sub-millisecond precision so the timestamp survives a round trip through the key.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}

/// Current time at millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}
