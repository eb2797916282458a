//! Calendar event reconciliation.
//!
//! Decides create / update / cancel / skip for each normalized calendar
//! event against the most recent call sharing `(client_id, appointment_id)`.
//! Duplicate deliveries are absorbed with no write and no audit row —
//! idempotency is the core correctness property here, since providers
//! re-deliver webhooks freely.

use crate::attendance::{transition_state, Attendance, ExtraUpdates};
use crate::db::{CallDb, DbCall, DbError, NewAuditEntry};
use crate::prospect::{determine_call_type, extract_prospect, ExtractedProspect};
use crate::types::{CallType, CalendarEventKind, CloserContext, EventStatus, NormalizedCalendarEvent};
use crate::util::format_utc;

/// What the reconciler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    Canceled,
    Skipped,
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub action: ReconcileAction,
    pub call: Option<DbCall>,
}

impl ReconcileOutcome {
    fn skipped(call: Option<DbCall>) -> Self {
        ReconcileOutcome {
            action: ReconcileAction::Skipped,
            call,
        }
    }
}

/// Whether an event ends the booking: provider-level cancellation, or a
/// decline by either side.
fn is_cancellation(event: &NormalizedCalendarEvent) -> bool {
    event.status == EventStatus::Cancelled
        || event.kind == CalendarEventKind::Cancellation
        || !event.declined_attendees.is_empty()
        || event
            .attendees
            .iter()
            .any(|a| a.response_status.as_deref() == Some("declined"))
}

fn cancellation_detail(event: &NormalizedCalendarEvent) -> String {
    if let Some(decl) = event.declined_attendees.first() {
        return format!("declined by {}", decl.email);
    }
    if let Some(decl) = event
        .attendees
        .iter()
        .find(|a| a.response_status.as_deref() == Some("declined"))
    {
        return format!("declined by {}", decl.email);
    }
    "cancelled by provider".to_string()
}

/// Reconcile one normalized calendar event into the record store.
pub fn handle_calendar_event(
    db: &CallDb,
    event: &NormalizedCalendarEvent,
    client_id: &str,
    closer: &CloserContext,
) -> Result<ReconcileOutcome, DbError> {
    let cancellation = is_cancellation(event);
    let existing = db.latest_call_for_appointment(client_id, &event.event_id)?;

    let Some(call) = existing else {
        if cancellation {
            // Nothing to cancel
            return Ok(ReconcileOutcome::skipped(None));
        }
        let created = create_call(db, event, client_id, closer)?;
        return Ok(ReconcileOutcome {
            action: ReconcileAction::Created,
            call: Some(created),
        });
    };

    let state = Attendance::from_stored(call.attendance.as_deref());
    let via_show = state.map(|s| s.reached_via_show()).unwrap_or(false);
    // Settled records are never mutated by calendar traffic: outcomes
    // reached through Show, plus terminal states like Canceled. A reused
    // appointment id against one means a fresh booking.
    let settled = via_show || state.map(|s| s.is_terminal()).unwrap_or(false);

    if cancellation {
        if via_show {
            // Calendar cleanup after the call happened must never overwrite
            // a real outcome.
            return Ok(ReconcileOutcome::skipped(Some(call)));
        }
        let extra = ExtraUpdates {
            audit_detail: Some(cancellation_detail(event)),
            ..Default::default()
        };
        let changed = transition_state(
            db,
            &call.call_id,
            client_id,
            Attendance::Canceled,
            "calendar_webhook",
            &extra,
        )?;
        let refreshed = db.get_call(&call.call_id, client_id)?;
        return Ok(ReconcileOutcome {
            action: if changed {
                ReconcileAction::Canceled
            } else {
                ReconcileAction::Skipped
            },
            call: refreshed,
        });
    }

    // Active event against an existing record: diff schedule + prospect.
    let extracted = extract_prospect(event, closer);

    let schedule_changed = stored_instant(&call.appointment_start)
        != Some(event.start_time.timestamp())
        || call.appointment_end.as_deref().and_then(|s| stored_instant(s))
            != event.end_time.map(|t| t.timestamp());

    let email_changed =
        !extracted.is_unknown() && !call.prospect_email.eq_ignore_ascii_case(&extracted.email);

    let name_update = prospect_name_update(&call, &extracted, email_changed);

    if !schedule_changed && !email_changed && name_update.is_none() {
        // True duplicate delivery: no write, no audit entry.
        return Ok(ReconcileOutcome::skipped(Some(call)));
    }

    if settled {
        // The slot's history is settled. A reused appointment id with a new
        // time is a new booking, never a mutation of the old record;
        // attendee drift alone against a settled record is ignored.
        if !schedule_changed {
            return Ok(ReconcileOutcome::skipped(Some(call)));
        }
        let created = create_call(db, event, client_id, closer)?;
        return Ok(ReconcileOutcome {
            action: ReconcileAction::Created,
            call: Some(created),
        });
    }

    update_call(db, event, client_id, &call, &extracted, email_changed, name_update)
}

/// Epoch seconds of a stored timestamp, for precision-insensitive compare.
fn stored_instant(s: &str) -> Option<i64> {
    crate::util::parse_utc(s).map(|dt| dt.timestamp())
}

/// The prospect name to write, if any.
///
/// A name extracted alongside a changed email always lands; with an
/// unchanged identity a name only fills a gap or corrects the record when
/// extraction is attendee-backed (known email). A title-scraped name never
/// clobbers one attached to a known prospect.
fn prospect_name_update(
    call: &DbCall,
    extracted: &ExtractedProspect,
    email_changed: bool,
) -> Option<String> {
    let candidate = extracted.name.as_deref()?;
    if call.prospect_name.as_deref() == Some(candidate) {
        return None;
    }
    if email_changed {
        return Some(candidate.to_string());
    }
    let stored_unknown = call.prospect_email.eq_ignore_ascii_case("unknown");
    if call.prospect_name.is_none() || stored_unknown || !extracted.is_unknown() {
        return Some(candidate.to_string());
    }
    None
}

fn create_call(
    db: &CallDb,
    event: &NormalizedCalendarEvent,
    client_id: &str,
    closer: &CloserContext,
) -> Result<DbCall, DbError> {
    let extracted = extract_prospect(event, closer);
    let call_type = determine_call_type(db, client_id, &extracted.email)?;
    let now = crate::util::utc_now();

    let call = DbCall {
        call_id: uuid::Uuid::new_v4().to_string(),
        appointment_id: event.event_id.clone(),
        client_id: client_id.to_string(),
        closer_id: closer.closer_id.clone(),
        appointment_start: format_utc(event.start_time),
        appointment_end: event.end_time.map(format_utc),
        timezone_origin: event.original_timezone.clone(),
        prospect_email: extracted.email.clone(),
        prospect_name: extracted.name.clone(),
        call_type: call_type.as_str().to_string(),
        attendance: None,
        call_outcome: None,
        transcript_status: None,
        transcript_link: None,
        call_duration_seconds: None,
        processing_status: None,
        ingestion_source: "calendar".to_string(),
        source: Some(event.provider.clone()),
        cash_collected: 0.0,
        revenue_generated: 0.0,
        lost_reason: None,
        date_closed: None,
        created: now.clone(),
        last_modified: now,
    };

    db.with_transaction(|db| {
        db.insert_call(&call)?;
        db.ensure_prospect(client_id, &extracted.email, extracted.name.as_deref())?;
        db.insert_audit(&NewAuditEntry {
            entity_type: "call",
            entity_id: &call.call_id,
            action: "created",
            field_changed: None,
            old_value: None,
            new_value: Some(&call.appointment_id),
            trigger_source: "calendar_webhook",
            trigger_detail: Some(&event.title),
            client_id,
        })?;
        Ok(())
    })?;

    Ok(call)
}

fn update_call(
    db: &CallDb,
    event: &NormalizedCalendarEvent,
    client_id: &str,
    call: &DbCall,
    extracted: &ExtractedProspect,
    email_changed: bool,
    name_update: Option<String>,
) -> Result<ReconcileOutcome, DbError> {
    let new_start = format_utc(event.start_time);
    let new_end = event.end_time.map(format_utc);

    // Classification re-runs only on an identity change, and only upgrades.
    let new_call_type = if email_changed && call.call_type != CallType::FollowUp.as_str() {
        match determine_call_type(db, client_id, &extracted.email)? {
            CallType::FollowUp => Some(CallType::FollowUp),
            CallType::FirstCall => None,
        }
    } else {
        None
    };

    let prospect = if email_changed {
        Some((
            extracted.email.as_str(),
            name_update.as_deref().or(extracted.name.as_deref()),
        ))
    } else {
        name_update
            .as_deref()
            .map(|name| (call.prospect_email.as_str(), Some(name)))
    };

    let schedule_changed = new_start != call.appointment_start
        || new_end.as_deref() != call.appointment_end.as_deref();

    db.with_transaction(|db| {
        db.update_call_booking(
            &call.call_id,
            &new_start,
            new_end.as_deref(),
            prospect,
            new_call_type.map(CallType::as_str),
        )?;

        if schedule_changed {
            db.insert_audit(&NewAuditEntry {
                entity_type: "call",
                entity_id: &call.call_id,
                action: "updated",
                field_changed: Some("appointment_date"),
                old_value: Some(&call.appointment_start),
                new_value: Some(&new_start),
                trigger_source: "calendar_webhook",
                trigger_detail: None,
                client_id,
            })?;
        }
        if email_changed {
            db.insert_audit(&NewAuditEntry {
                entity_type: "call",
                entity_id: &call.call_id,
                action: "updated",
                field_changed: Some("prospect_email"),
                old_value: Some(&call.prospect_email),
                new_value: Some(&extracted.email),
                trigger_source: "calendar_webhook",
                trigger_detail: None,
                client_id,
            })?;
            db.ensure_prospect(client_id, &extracted.email, extracted.name.as_deref())?;
        }
        if let Some(ref name) = name_update {
            db.insert_audit(&NewAuditEntry {
                entity_type: "call",
                entity_id: &call.call_id,
                action: "updated",
                field_changed: Some("prospect_name"),
                old_value: call.prospect_name.as_deref(),
                new_value: Some(name),
                trigger_source: "calendar_webhook",
                trigger_detail: None,
                client_id,
            })?;
        }
        Ok(())
    })?;

    let refreshed = db.get_call(&call.call_id, client_id)?;
    Ok(ReconcileOutcome {
        action: ReconcileAction::Updated,
        call: refreshed,
    })
}
