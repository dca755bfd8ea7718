//! Shared key handling for storage backends.
//!
//! Keys are produced by `mlrepo_core::keys::storage_key` (`{epoch_ms}-{file_name}`).
//! Backends only validate them and encode them for URLs.

use crate::traits::{StorageError, StorageResult};

/// Reject keys and bucket names that are empty or could escape their bucket.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.split('/').any(|segment| segment == "..")
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Percent-encode each path segment of a key for use in a URL.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `{base}/{bucket}/{encoded key}`
pub fn join_url(base: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(bucket),
        encode_key(key)
    )
}
