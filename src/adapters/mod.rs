//! Per-provider calendar payload normalization.
//!
//! Each provider gets a tagged adapter implementing one capability trait;
//! the reconciliation core only ever sees [`NormalizedCalendarEvent`] and
//! never branches on provider-specific payload shape.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{CalendarEventKind, NormalizedCalendarEvent};

mod calcom;
mod google;

pub use calcom::CalcomAdapter;
pub use google::GoogleCalendarAdapter;

pub trait CalendarAdapter: Send + Sync {
    /// Human label recorded as the call's `source`.
    fn provider(&self) -> &'static str;

    /// What kind of change this payload represents.
    fn classify_event_type(&self, payload: &Value) -> CalendarEventKind;

    /// Whether the payload ends the booking.
    fn is_cancelled(&self, payload: &Value) -> bool;

    /// Convert a raw webhook payload into the normalized shape. `None` for
    /// payloads missing the fields a call record requires (id, start time).
    fn normalize(&self, payload: &Value) -> Option<NormalizedCalendarEvent>;
}

/// Resolve an adapter by provider tag.
pub fn adapter_for(provider: &str) -> Option<Box<dyn CalendarAdapter>> {
    match provider {
        "google" => Some(Box::new(GoogleCalendarAdapter)),
        "calcom" => Some(Box::new(CalcomAdapter)),
        _ => None,
    }
}

/// Parse a provider datetime: RFC3339, or a bare `YYYY-MM-DD` (all-day
/// events) treated as midnight UTC.
pub(crate) fn parse_event_datetime(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if s.contains('T') {
        crate::util::parse_utc(s)
    } else {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
    }
}
