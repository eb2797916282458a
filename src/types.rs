//! Provider-agnostic domain types.
//!
//! Normalizer adapters produce exactly one event shape; the core never
//! branches on provider-specific payload structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DbCloser;

/// What kind of calendar change an event represents, as classified by the
/// originating adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalendarEventKind {
    Booking,
    Reschedule,
    Cancellation,
}

/// Event-level status reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_organizer: bool,
    /// Provider RSVP literal (accepted / declined / tentative / needsAction).
    #[serde(default)]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclinedAttendee {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A calendar event after adapter normalization. Times are absolute UTC;
/// `original_timezone` is carried as provenance only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCalendarEvent {
    pub event_id: String,
    /// Human label of the originating provider ("google", "calcom", ...).
    pub provider: String,
    pub kind: CalendarEventKind,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub original_timezone: Option<String>,
    pub organizer_email: Option<String>,
    #[serde(default)]
    pub attendees: Vec<EventAttendee>,
    pub status: EventStatus,
    #[serde(default)]
    pub declined_attendees: Vec<DeclinedAttendee>,
}

/// The closer a webhook was routed to, resolved upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloserContext {
    pub closer_id: String,
    pub client_id: String,
    pub name: String,
    pub work_email: String,
    pub transcript_provider: Option<String>,
    pub status: String,
}

impl From<&DbCloser> for CloserContext {
    fn from(row: &DbCloser) -> Self {
        CloserContext {
            closer_id: row.closer_id.clone(),
            client_id: row.client_id.clone(),
            name: row.name.clone(),
            work_email: row.work_email.clone(),
            transcript_provider: row.transcript_provider.clone(),
            status: row.status.clone(),
        }
    }
}

/// First-vs-repeat classification for a call. Upgrade-only: once a prospect
/// has attended a call, later bookings never regress to First Call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    FirstCall,
    FollowUp,
}

impl CallType {
    pub fn as_str(self) -> &'static str {
        match self {
            CallType::FirstCall => "First Call",
            CallType::FollowUp => "Follow Up",
        }
    }

    pub fn parse(s: &str) -> Option<CallType> {
        match s {
            "First Call" => Some(CallType::FirstCall),
            "Follow Up" => Some(CallType::FollowUp),
            _ => None,
        }
    }
}
