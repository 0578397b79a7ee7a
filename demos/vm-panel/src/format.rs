//! Human-readable rendering of panel values.

use chrono::{DateTime, Local, Utc};

/// Placeholder shown when a value is not available.
pub const NO_VALUE: &str = "—";

pub fn format_uptime(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

/// Formats byte count with binary units.
pub fn format_bytes(bytes: f64) -> String {
    let mut value = bytes;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024. {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.;
    }
    format!("{:.1} TB", value)
}

/// Formats time in the local timezone.
pub fn format_datetime(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => NO_VALUE.to_string(),
    }
}

/// Returns short label of power state code, e.g. `PowerState/deallocated` is shown as `Stopped`.
pub fn power_state_label(code: &str) -> &'static str {
    let code = code.to_ascii_lowercase();
    if code.contains("running") {
        "Running"
    } else if code.contains("deallocated") {
        "Stopped"
    } else if code.contains("starting") {
        "Starting..."
    } else if code.contains("deallocating") {
        "Stopping..."
    } else {
        "Unknown"
    }
}
