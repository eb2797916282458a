//! Small shared helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as an RFC3339 string with second precision
/// (`2026-08-04T15:30:00Z`).
///
/// All stored timestamps use this format so SQLite `datetime()` comparisons
/// and plain string ordering agree.
pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a `DateTime<Utc>` the way [`utc_now`] does.
pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored RFC3339 timestamp. Tolerates a bare `Z` suffix as well as
/// explicit offsets; returns `None` for anything unparseable.
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00")))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
