//! Helpers shared by the `mlrepo` binary: tracing setup, table output and the
//! HTTP download sink.

use async_trait::async_trait;
use mlrepo_core::format::{format_file_size, format_upload_date};
use mlrepo_core::{AppError, UploadRecord};
use mlrepo_services::{DownloadTicket, SaveAs};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render records as a fixed-width table.
pub fn render_table(records: &[UploadRecord]) -> String {
    let mut out = String::new();

    if records.is_empty() {
        out.push_str("No files found.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<36} {:<8} {:<40} {:>12} {:>20}",
        "ID", "Type", "File Name", "Size", "Uploaded"
    );
    let _ = writeln!(out, "{}", "-".repeat(120));

    for record in records {
        let _ = writeln!(
            out,
            "{:<36} {:<8} {:<40} {:>12} {:>20}",
            record.id,
            record.file_type,
            truncate_string(&record.file_name, 40),
            format_file_size(record.size.max(0) as u64),
            format_upload_date(record.uploaded_at)
        );
    }

    let _ = writeln!(out, "\n{} file(s)", records.len());
    out
}

/// Where a download named `suggested_name` is written inside `out_dir`.
///
/// Only the final path component is kept so a stored name cannot escape `out_dir`.
pub fn download_target(out_dir: &Path, suggested_name: &str) -> Result<PathBuf, AppError> {
    let name = Path::new(suggested_name)
        .file_name()
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid file name: {}", suggested_name)))?;
    Ok(out_dir.join(name))
}

/// Fetches the public URL with `reqwest` and writes the body into a directory.
pub struct HttpSaveAs {
    client: reqwest::Client,
    out_dir: PathBuf,
}

impl HttpSaveAs {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            out_dir: out_dir.into(),
        }
    }
}

#[async_trait]
impl SaveAs for HttpSaveAs {
    async fn save(&self, ticket: &DownloadTicket) -> Result<(), AppError> {
        let target = download_target(&self.out_dir, &ticket.suggested_name)?;

        let response = self
            .client
            .get(&ticket.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Storage(format!("Download of {} failed: {}", ticket.url, e)))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Storage(format!("Download of {} failed: {}", ticket.url, e)))?;

        tokio::fs::write(&target, &body).await?;

        tracing::info!(
            url = %ticket.url,
            path = %target.display(),
            size_bytes = body.len(),
            "File saved"
        );

        Ok(())
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mlrepo_core::FileCategory;
    use uuid::Uuid;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("modèle-énorme.pth", 9), "modèle...");
    }

    #[test]
    fn table_shows_human_sizes_and_dates() {
        let record = UploadRecord {
            id: Uuid::nil(),
            file_name: "model.pth".to_string(),
            file_type: FileCategory::Model,
            bucket: "ml-models".to_string(),
            size: 1536,
            uploaded_at: Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap(),
        };

        let table = render_table(&[record]);
        assert!(table.contains("model.pth"));
        assert!(table.contains("1.5 KB"));
        assert!(table.contains("Mar 9, 2024, 14:30"));
        assert!(table.contains("1 file(s)"));
    }

    #[test]
    fn empty_table() {
        assert_eq!(render_table(&[]), "No files found.\n");
    }

    #[test]
    fn download_target_stays_in_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            download_target(dir.path(), "data.csv").unwrap(),
            dir.path().join("data.csv")
        );
        assert_eq!(
            download_target(dir.path(), "../../etc/passwd").unwrap(),
            dir.path().join("passwd")
        );
        assert!(download_target(dir.path(), "..").is_err());
    }
}
