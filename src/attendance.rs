//! Attendance state machine.
//!
//! `attendance` is a finite-state field. NULL and the legacy literal
//! `"Scheduled"` are equivalent initial values — older imported rows carry
//! the literal, newly created calls carry NULL. Normalization happens once
//! on read so the transition table only ever sees canonical values, while
//! audit entries preserve whichever literal was actually stored.
//!
//! Recovery transitions run toward states carrying *more* information: a
//! late transcript is authoritative over timeout-inferred absence, so
//! `Ghosted - No Show → Show` and `Ghosted - No Show → Overbooked` are
//! legal while `Overbooked → Ghosted - No Show` is not. This asymmetry is
//! deliberate; do not "fix" it.

use serde::{Deserialize, Serialize};

use crate::db::{CallDb, DbError, NewAuditEntry};

/// Canonical attendance states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attendance {
    /// Canonical form of NULL / legacy `"Scheduled"`.
    Scheduled,
    WaitingForOutcome,
    Show,
    NoRecording,
    GhostedNoShow,
    Overbooked,
    Canceled,
    ClosedWon,
    Lost,
    Deposit,
    FollowUp,
    Disqualified,
    NotPitched,
}

impl Attendance {
    /// The stored string literal for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Attendance::Scheduled => "Scheduled",
            Attendance::WaitingForOutcome => "Waiting for Outcome",
            Attendance::Show => "Show",
            Attendance::NoRecording => "No Recording",
            Attendance::GhostedNoShow => "Ghosted - No Show",
            Attendance::Overbooked => "Overbooked",
            Attendance::Canceled => "Canceled",
            Attendance::ClosedWon => "Closed - Won",
            Attendance::Lost => "Lost",
            Attendance::Deposit => "Deposit",
            Attendance::FollowUp => "Follow Up",
            Attendance::Disqualified => "Disqualified",
            Attendance::NotPitched => "Not Pitched",
        }
    }

    /// Parse a stored literal. `None` for unrecognized values.
    pub fn parse(s: &str) -> Option<Attendance> {
        match s {
            "Scheduled" => Some(Attendance::Scheduled),
            "Waiting for Outcome" => Some(Attendance::WaitingForOutcome),
            "Show" => Some(Attendance::Show),
            "No Recording" => Some(Attendance::NoRecording),
            "Ghosted - No Show" => Some(Attendance::GhostedNoShow),
            "Overbooked" => Some(Attendance::Overbooked),
            "Canceled" => Some(Attendance::Canceled),
            "Closed - Won" => Some(Attendance::ClosedWon),
            "Lost" => Some(Attendance::Lost),
            "Deposit" => Some(Attendance::Deposit),
            "Follow Up" => Some(Attendance::FollowUp),
            "Disqualified" => Some(Attendance::Disqualified),
            "Not Pitched" => Some(Attendance::NotPitched),
            _ => None,
        }
    }

    /// Normalize a raw stored column value. NULL ≡ `"Scheduled"`.
    pub fn from_stored(raw: Option<&str>) -> Option<Attendance> {
        match raw {
            None => Some(Attendance::Scheduled),
            Some(s) => Attendance::parse(s),
        }
    }

    /// Allowed targets from this state. Everything else is rejected.
    pub fn allowed_targets(self) -> &'static [Attendance] {
        use Attendance::*;
        match self {
            Scheduled => &[WaitingForOutcome, Show, NoRecording, Overbooked, Canceled],
            WaitingForOutcome => &[Show, NoRecording, GhostedNoShow, Overbooked, Canceled],
            Show => &[ClosedWon, Lost, Deposit, FollowUp, Disqualified, NotPitched],
            NoRecording => &[Show],
            GhostedNoShow => &[Show, Overbooked],
            Overbooked => &[Show, Canceled],
            Deposit => &[ClosedWon, Lost],
            FollowUp => &[ClosedWon, Lost, Deposit],
            Canceled | ClosedWon | Lost | Disqualified | NotPitched => &[],
        }
    }

    pub fn can_transition_to(self, target: Attendance) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// No outgoing transitions at all.
    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// States only reachable through `Show`. A calendar cleanup event must
    /// never move a call out of these, and a reused appointment id against
    /// such a record means a new booking, not a mutation.
    pub fn reached_via_show(self) -> bool {
        use Attendance::*;
        matches!(
            self,
            Show | ClosedWon | Lost | Deposit | FollowUp | Disqualified | NotPitched
        )
    }
}

/// Optional field updates applied atomically with a transition.
#[derive(Debug, Default, Clone)]
pub struct ExtraUpdates {
    pub transcript_status: Option<String>,
    pub transcript_link: Option<String>,
    pub call_duration_seconds: Option<i64>,
    pub call_outcome: Option<String>,
    pub processing_status: Option<String>,
    pub date_closed: Option<String>,
    /// Recorded as `trigger_detail` on the audit row; not a column update.
    pub audit_detail: Option<String>,
}

/// Validate and apply an attendance transition.
///
/// Returns `Ok(false)` — no write, no audit row — when the call is missing,
/// the stored literal is unrecognized, the `(current, target)` pair is not
/// in the table, or a concurrent writer changed the record between the read
/// and the conditional UPDATE. Callers treat `false` as "no state change
/// occurred" and proceed without raising.
///
/// On success the UPDATE, any extra field updates, and exactly one audit row
/// commit in a single transaction; the audit `old_value` preserves the
/// stored literal (NULL vs `"Scheduled"`). A transition into `Show` then
/// invokes the overbooking resolver before returning.
pub fn transition_state(
    db: &CallDb,
    call_id: &str,
    client_id: &str,
    target: Attendance,
    trigger: &str,
    extra: &ExtraUpdates,
) -> Result<bool, DbError> {
    let Some(call) = db.get_call(call_id, client_id)? else {
        return Ok(false);
    };

    let Some(current) = Attendance::from_stored(call.attendance.as_deref()) else {
        log::warn!(
            "Call {} carries unrecognized attendance literal {:?}; transition to {} refused",
            call_id,
            call.attendance,
            target.as_str()
        );
        return Ok(false);
    };

    if !current.can_transition_to(target) {
        return Ok(false);
    }

    let applied = db.with_transaction(|db| {
        // Conditional UPDATE re-checks the stored literal: a transition
        // validated against a stale read affects zero rows instead of
        // silently overwriting a concurrent writer.
        let changed =
            db.cas_update_attendance(call_id, client_id, call.attendance.as_deref(), target, extra)?;
        if !changed {
            return Ok(false);
        }

        db.insert_audit(&NewAuditEntry {
            entity_type: "call",
            entity_id: call_id,
            action: "state_change",
            field_changed: Some("attendance"),
            old_value: call.attendance.as_deref(),
            new_value: Some(target.as_str()),
            trigger_source: trigger,
            trigger_detail: extra.audit_detail.as_deref(),
            client_id,
        })?;

        Ok(true)
    })?;

    if applied && target == Attendance::Show {
        let demoted = crate::overbooking::resolve_overlaps(db, &call)?;
        if demoted > 0 {
            log::info!(
                "Overbooking resolver demoted {} sibling call(s) after {} showed",
                demoted,
                call_id
            );
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::{insert_call, CallSeed};

    #[test]
    fn test_legacy_alias_normalization() {
        assert_eq!(Attendance::from_stored(None), Some(Attendance::Scheduled));
        assert_eq!(
            Attendance::from_stored(Some("Scheduled")),
            Some(Attendance::Scheduled)
        );
        assert_eq!(Attendance::from_stored(Some("bogus")), None);
    }

    #[test]
    fn test_parse_round_trips_every_state() {
        use Attendance::*;
        for state in [
            Scheduled,
            WaitingForOutcome,
            Show,
            NoRecording,
            GhostedNoShow,
            Overbooked,
            Canceled,
            ClosedWon,
            Lost,
            Deposit,
            FollowUp,
            Disqualified,
            NotPitched,
        ] {
            assert_eq!(Attendance::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn test_recovery_asymmetry_preserved() {
        // Toward more information: legal
        assert!(Attendance::GhostedNoShow.can_transition_to(Attendance::Show));
        assert!(Attendance::GhostedNoShow.can_transition_to(Attendance::Overbooked));
        assert!(Attendance::NoRecording.can_transition_to(Attendance::Show));
        assert!(Attendance::Overbooked.can_transition_to(Attendance::Show));
        // Away from it: rejected
        assert!(!Attendance::Overbooked.can_transition_to(Attendance::GhostedNoShow));
        assert!(!Attendance::Show.can_transition_to(Attendance::GhostedNoShow));
    }

    #[test]
    fn test_no_shortcut_to_closed_won() {
        assert!(!Attendance::Scheduled.can_transition_to(Attendance::ClosedWon));
        assert!(!Attendance::WaitingForOutcome.can_transition_to(Attendance::ClosedWon));
        assert!(Attendance::Show.can_transition_to(Attendance::ClosedWon));
        assert!(Attendance::Deposit.can_transition_to(Attendance::ClosedWon));
    }

    #[test]
    fn test_transition_missing_call_is_false() {
        let db = CallDb::open_in_memory().expect("open");
        let ok = transition_state(
            &db,
            "nope",
            "client-1",
            Attendance::Show,
            "transcript_received",
            &ExtraUpdates::default(),
        )
        .expect("transition");
        assert!(!ok);
        assert_eq!(db.count_audit_entries("nope").expect("count"), 0);
    }

    #[test]
    fn test_invalid_transition_leaves_record_untouched() {
        let db = CallDb::open_in_memory().expect("open");
        let call = insert_call(&db, CallSeed::new("appt-1", "client-1", "closer-1"));

        let ok = transition_state(
            &db,
            &call.call_id,
            &call.client_id,
            Attendance::ClosedWon,
            "payment_received",
            &ExtraUpdates::default(),
        )
        .expect("transition");
        assert!(!ok);

        let after = db
            .get_call(&call.call_id, &call.client_id)
            .expect("get")
            .expect("exists");
        assert_eq!(after.attendance, None);
        assert_eq!(after.last_modified, call.last_modified);
        assert_eq!(db.count_audit_entries(&call.call_id).expect("count"), 0);
    }

    #[test]
    fn test_successful_transition_writes_one_audit_row() {
        let db = CallDb::open_in_memory().expect("open");
        let call = insert_call(&db, CallSeed::new("appt-1", "client-1", "closer-1"));

        let ok = transition_state(
            &db,
            &call.call_id,
            &call.client_id,
            Attendance::WaitingForOutcome,
            "appointment_time_passed",
            &ExtraUpdates::default(),
        )
        .expect("transition");
        assert!(ok);

        let after = db
            .get_call(&call.call_id, &call.client_id)
            .expect("get")
            .expect("exists");
        assert_eq!(after.attendance.as_deref(), Some("Waiting for Outcome"));

        let entries = db.audit_entries_for(&call.call_id).expect("audit");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field_changed.as_deref(), Some("attendance"));
        // Freshly created call stores NULL, and the audit row preserves it
        assert_eq!(entries[0].old_value, None);
        assert_eq!(entries[0].new_value.as_deref(), Some("Waiting for Outcome"));
        assert_eq!(entries[0].trigger_source, "appointment_time_passed");
    }

    #[test]
    fn test_legacy_literal_preserved_in_audit() {
        let db = CallDb::open_in_memory().expect("open");
        let call = insert_call(
            &db,
            CallSeed::new("appt-1", "client-1", "closer-1").attendance(Some("Scheduled")),
        );

        transition_state(
            &db,
            &call.call_id,
            &call.client_id,
            Attendance::Canceled,
            "calendar_webhook",
            &ExtraUpdates::default(),
        )
        .expect("transition");

        let entries = db.audit_entries_for(&call.call_id).expect("audit");
        assert_eq!(entries[0].old_value.as_deref(), Some("Scheduled"));
    }

    #[test]
    fn test_extra_updates_applied_atomically() {
        let db = CallDb::open_in_memory().expect("open");
        let call = insert_call(
            &db,
            CallSeed::new("appt-1", "client-1", "closer-1")
                .attendance(Some("Waiting for Outcome")),
        );

        let extra = ExtraUpdates {
            transcript_status: Some("No Transcript".to_string()),
            ..Default::default()
        };
        let ok = transition_state(
            &db,
            &call.call_id,
            &call.client_id,
            Attendance::GhostedNoShow,
            "transcript_timeout",
            &extra,
        )
        .expect("transition");
        assert!(ok);

        let after = db
            .get_call(&call.call_id, &call.client_id)
            .expect("get")
            .expect("exists");
        assert_eq!(after.attendance.as_deref(), Some("Ghosted - No Show"));
        assert_eq!(after.transcript_status.as_deref(), Some("No Transcript"));
    }

    #[test]
    fn test_cas_rejects_stale_expectation() {
        let db = CallDb::open_in_memory().expect("open");
        let call = insert_call(&db, CallSeed::new("appt-1", "client-1", "closer-1"));

        // Simulate a concurrent writer landing between read and write: the
        // conditional UPDATE expects NULL but the row now says Canceled.
        let changed = db
            .cas_update_attendance(
                &call.call_id,
                &call.client_id,
                Some("Canceled"),
                Attendance::Show,
                &ExtraUpdates::default(),
            )
            .expect("cas");
        assert!(!changed);

        let after = db
            .get_call(&call.call_id, &call.client_id)
            .expect("get")
            .expect("exists");
        assert_eq!(after.attendance, None, "stale write must not land");
    }

    #[test]
    fn test_replayed_transition_noops() {
        let db = CallDb::open_in_memory().expect("open");
        let call = insert_call(&db, CallSeed::new("appt-1", "client-1", "closer-1"));

        let first = transition_state(
            &db,
            &call.call_id,
            &call.client_id,
            Attendance::Canceled,
            "calendar_webhook",
            &ExtraUpdates::default(),
        )
        .expect("first");
        assert!(first);

        // Re-delivery of the same cancellation
        let second = transition_state(
            &db,
            &call.call_id,
            &call.client_id,
            Attendance::Canceled,
            "calendar_webhook",
            &ExtraUpdates::default(),
        )
        .expect("second");
        assert!(!second);
        assert_eq!(db.count_audit_entries(&call.call_id).expect("count"), 1);
    }
}
