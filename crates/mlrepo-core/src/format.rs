//! Display helpers for listings.

use chrono::{DateTime, Utc};

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with binary units and at most two decimals ("1.5 KB", "0 Bytes").
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let k = 1024f64;
    let exponent = ((bytes as f64).ln() / k.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / k.powi(exponent as i32);

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}

/// Short date for listings, e.g. "Nov 14, 2023, 22:13".
pub fn format_upload_date(ts: DateTime<Utc>) -> String {
    ts.format("%b %-d, %Y, %H:%M").to_string()
}
