//! Cal.com webhook payload normalization.
//!
//! Cal.com wraps the booking under `payload` and names the change in
//! `triggerEvent` (BOOKING_CREATED / BOOKING_RESCHEDULED /
//! BOOKING_CANCELLED).

use serde::Deserialize;
use serde_json::Value;

use crate::types::{
    CalendarEventKind, EventAttendee, EventStatus, NormalizedCalendarEvent,
};

use super::{parse_event_datetime, CalendarAdapter};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalcomWebhook {
    #[serde(default)]
    trigger_event: String,
    payload: Option<CalcomBooking>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalcomBooking {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    title: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    status: Option<String>,
    organizer: Option<CalcomPerson>,
    #[serde(default)]
    attendees: Vec<CalcomPerson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalcomPerson {
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    time_zone: Option<String>,
}

pub struct CalcomAdapter;

impl CalendarAdapter for CalcomAdapter {
    fn provider(&self) -> &'static str {
        "calcom"
    }

    fn classify_event_type(&self, payload: &Value) -> CalendarEventKind {
        match payload.get("triggerEvent").and_then(|t| t.as_str()) {
            Some("BOOKING_CANCELLED") | Some("BOOKING_REJECTED") => {
                CalendarEventKind::Cancellation
            }
            Some("BOOKING_RESCHEDULED") => CalendarEventKind::Reschedule,
            _ => CalendarEventKind::Booking,
        }
    }

    fn is_cancelled(&self, payload: &Value) -> bool {
        self.classify_event_type(payload) == CalendarEventKind::Cancellation
            || payload
                .get("payload")
                .and_then(|p| p.get("status"))
                .and_then(|s| s.as_str())
                .map(|s| s.eq_ignore_ascii_case("cancelled"))
                .unwrap_or(false)
    }

    fn normalize(&self, payload: &Value) -> Option<NormalizedCalendarEvent> {
        let webhook: CalcomWebhook = serde_json::from_value(payload.clone()).ok()?;
        let booking = webhook.payload?;
        if booking.uid.is_empty() {
            return None;
        }

        let start_time = booking
            .start_time
            .as_deref()
            .and_then(parse_event_datetime)?;
        let end_time = booking.end_time.as_deref().and_then(parse_event_datetime);

        let organizer_email = booking
            .organizer
            .as_ref()
            .map(|o| o.email.clone())
            .filter(|e| !e.is_empty());

        let attendees: Vec<EventAttendee> = booking
            .attendees
            .iter()
            .filter(|a| !a.email.is_empty())
            .map(|a| EventAttendee {
                email: a.email.clone(),
                name: a.name.clone(),
                is_organizer: false,
                response_status: None,
            })
            .collect();

        let original_timezone = booking
            .organizer
            .as_ref()
            .and_then(|o| o.time_zone.clone())
            .or_else(|| booking.attendees.first().and_then(|a| a.time_zone.clone()));

        let cancelled = self.is_cancelled(payload);

        Some(NormalizedCalendarEvent {
            event_id: booking.uid,
            provider: self.provider().to_string(),
            kind: self.classify_event_type(payload),
            title: booking.title.unwrap_or_else(|| "(No title)".to_string()),
            start_time,
            end_time,
            original_timezone,
            organizer_email,
            attendees,
            status: if cancelled {
                EventStatus::Cancelled
            } else {
                EventStatus::Confirmed
            },
            // Cal.com cancels the booking outright rather than reporting
            // per-attendee declines
            declined_attendees: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(trigger: &str) -> Value {
        serde_json::json!({
            "triggerEvent": trigger,
            "payload": {
                "uid": "calcom-abc123",
                "title": "Strategy Session between Alex Morgan and Priya Patel",
                "startTime": "2026-02-17T20:00:00Z",
                "endTime": "2026-02-17T21:00:00Z",
                "status": "ACCEPTED",
                "organizer": {"email": "alex@agency.io", "name": "Alex Morgan", "timeZone": "America/New_York"},
                "attendees": [
                    {"email": "priya@x.com", "name": "Priya Patel", "timeZone": "Europe/London"}
                ]
            }
        })
    }

    #[test]
    fn test_normalize_booking_created() {
        let event = CalcomAdapter
            .normalize(&sample_payload("BOOKING_CREATED"))
            .expect("normalize");

        assert_eq!(event.event_id, "calcom-abc123");
        assert_eq!(event.provider, "calcom");
        assert_eq!(event.kind, CalendarEventKind::Booking);
        assert_eq!(event.status, EventStatus::Confirmed);
        assert_eq!(event.attendees.len(), 1);
        assert_eq!(event.attendees[0].email, "priya@x.com");
        assert_eq!(event.original_timezone.as_deref(), Some("America/New_York"));
        assert_eq!(event.organizer_email.as_deref(), Some("alex@agency.io"));
    }

    #[test]
    fn test_classify_trigger_events() {
        let adapter = CalcomAdapter;
        assert_eq!(
            adapter.classify_event_type(&sample_payload("BOOKING_RESCHEDULED")),
            CalendarEventKind::Reschedule
        );
        assert_eq!(
            adapter.classify_event_type(&sample_payload("BOOKING_CANCELLED")),
            CalendarEventKind::Cancellation
        );
        assert!(adapter.is_cancelled(&sample_payload("BOOKING_CANCELLED")));
        assert!(!adapter.is_cancelled(&sample_payload("BOOKING_CREATED")));
    }

    #[test]
    fn test_cancelled_status_field_detected() {
        let mut payload = sample_payload("BOOKING_CREATED");
        payload["payload"]["status"] = Value::String("CANCELLED".to_string());
        assert!(CalcomAdapter.is_cancelled(&payload));

        let event = CalcomAdapter.normalize(&payload).expect("normalize");
        assert_eq!(event.status, EventStatus::Cancelled);
    }

    #[test]
    fn test_missing_uid_rejected() {
        let payload = serde_json::json!({
            "triggerEvent": "BOOKING_CREATED",
            "payload": {"title": "x", "startTime": "2026-02-17T20:00:00Z"}
        });
        assert!(CalcomAdapter.normalize(&payload).is_none());
    }
}
