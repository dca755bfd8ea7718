//! Stage-time file validation. Nothing here performs I/O.

use crate::error::AppError;
use crate::models::FileCategory;

/// Lowercased extension after the last `.`, or `None` if the name has no dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Check `file_name` against the allow-list of `category`.
pub fn validate_file_type(file_name: &str, category: FileCategory) -> Result<String, AppError> {
    let invalid = || AppError::InvalidFileType {
        file_name: file_name.to_string(),
        category,
    };

    let extension = file_extension(file_name).ok_or_else(invalid)?;

    if !category.allowed_extensions().contains(&extension.as_str()) {
        return Err(invalid());
    }

    Ok(extension)
}

/// Check `size` against an optional byte limit.
pub fn validate_file_size(file_name: &str, size: u64, limit: Option<u64>) -> Result<(), AppError> {
    match limit {
        Some(limit) if size > limit => Err(AppError::PayloadTooLarge {
            file_name: file_name.to_string(),
            size,
            limit,
        }),
        _ => Ok(()),
    }
}
