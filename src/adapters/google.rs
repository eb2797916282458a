//! Google Calendar event resource normalization.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{
    CalendarEventKind, DeclinedAttendee, EventAttendee, EventStatus, NormalizedCalendarEvent,
};

use super::{parse_event_datetime, CalendarAdapter};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
    organizer: Option<Organizer>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<String>,
    date: Option<String>,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAttendee {
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    organizer: Option<bool>,
    #[serde(default)]
    response_status: Option<String>,
    #[serde(default)]
    resource: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organizer {
    #[serde(default)]
    email: String,
}

pub struct GoogleCalendarAdapter;

impl CalendarAdapter for GoogleCalendarAdapter {
    fn provider(&self) -> &'static str {
        "google"
    }

    fn classify_event_type(&self, payload: &Value) -> CalendarEventKind {
        if self.is_cancelled(payload) {
            CalendarEventKind::Cancellation
        } else {
            // Google delivers reschedules as plain updates of the same
            // resource; the reconciler's diff decides what changed.
            CalendarEventKind::Booking
        }
    }

    fn is_cancelled(&self, payload: &Value) -> bool {
        payload.get("status").and_then(|s| s.as_str()) == Some("cancelled")
    }

    fn normalize(&self, payload: &Value) -> Option<NormalizedCalendarEvent> {
        let raw: GoogleEventRaw = serde_json::from_value(payload.clone()).ok()?;
        if raw.id.is_empty() {
            return None;
        }

        let start_field = raw.start.as_ref()?;
        let start_time = start_field
            .date_time
            .as_deref()
            .or(start_field.date.as_deref())
            .and_then(parse_event_datetime)?;
        let end_time = raw
            .end
            .as_ref()
            .and_then(|e| e.date_time.as_deref().or(e.date.as_deref()))
            .and_then(parse_event_datetime);

        let status = if self.is_cancelled(payload) {
            EventStatus::Cancelled
        } else {
            EventStatus::Confirmed
        };

        // Resource rooms never count as attendees
        let attendees: Vec<EventAttendee> = raw
            .attendees
            .iter()
            .filter(|a| a.resource != Some(true) && !a.email.is_empty())
            .map(|a| EventAttendee {
                email: a.email.clone(),
                name: a.display_name.clone(),
                is_organizer: a.organizer == Some(true),
                response_status: a.response_status.clone(),
            })
            .collect();

        let declined_attendees: Vec<DeclinedAttendee> = attendees
            .iter()
            .filter(|a| a.response_status.as_deref() == Some("declined"))
            .map(|a| DeclinedAttendee {
                email: a.email.clone(),
                name: a.name.clone(),
            })
            .collect();

        Some(NormalizedCalendarEvent {
            event_id: raw.id,
            provider: self.provider().to_string(),
            kind: self.classify_event_type(payload),
            title: raw.summary.unwrap_or_else(|| "(No title)".to_string()),
            start_time,
            end_time,
            original_timezone: start_field.time_zone.clone(),
            organizer_email: raw.organizer.map(|o| o.email).filter(|e| !e.is_empty()),
            attendees,
            status,
            declined_attendees,
        })
    }
}
