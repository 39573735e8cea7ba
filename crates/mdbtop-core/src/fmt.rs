//! Shared formatting helpers for the live table.
//!
//! Pure formatting functions only; no ratatui styles or layout live here.

use std::time::Duration;

/// Placeholder rendered for the not-applicable disk-usage triple.
pub const SENTINEL: &str = "-";

/// Format byte count as human-readable size: `"1.5G"`, `"100.3M"`, `"50.0K"`, `"512B"`.
pub fn format_bytes(bytes: u64) -> String {
    let f = bytes as f64;
    if bytes >= 1024 * 1024 * 1024 * 1024 {
        format!("{:.1}T", f / (1024.0 * 1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 * 1024 {
        format!("{:.1}G", f / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1}M", f / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1}K", f / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

/// Format an optional byte count, `-` for `None`.
pub fn format_opt_bytes(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| SENTINEL.to_string(), format_bytes)
}

/// Format a percentage with one decimal: `"12.3"`.
pub fn format_percent(pct: f64) -> String {
    if pct.is_finite() {
        format!("{:.1}", pct)
    } else {
        SENTINEL.to_string()
    }
}

/// Format elapsed time as `H:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
