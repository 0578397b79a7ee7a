//! Timestamp encoding of persisted simulation state.
//!
//! Timestamps are always written in one canonical form (RFC 3339, microseconds, `Z` suffix),
//! but are read leniently so that records written with an explicit offset
//! (`2026-02-07T22:21:27.872298+00:00`) or without fractional seconds still resolve to the same instant.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Formats timestamp in the canonical on-disk form.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses timestamp written with `Z` suffix, explicit offset or no offset at all (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(s) {
        return Some(time.with_timezone(&Utc));
    }
    // space between date and time
    if let Ok(time) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(time.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
