//! Overbooking resolution.
//!
//! A closer is one person: of several overlapping bookings only one can
//! actually have happened, and a transcript proves which. When a call lands
//! in `Show`, every overlapping sibling still in an unresolved state is
//! demoted to `Overbooked`. Siblings already resolved (attended, cancelled,
//! closed) are left alone — the signal that resolved them is as or more
//! authoritative than the overlap inference.

use crate::attendance::{transition_state, Attendance, ExtraUpdates};
use crate::db::{CallDb, DbCall, DbError};

/// Demote unresolved siblings overlapping the shown call's window.
///
/// Scans the closer's calls across all clients using a half-open
/// `[start, end)` overlap test; siblings without an end time are skipped.
/// Returns the number of siblings demoted. Per-sibling store failures are
/// absorbed and logged so one bad record cannot block the rest.
pub fn resolve_overlaps(db: &CallDb, shown: &DbCall) -> Result<usize, DbError> {
    let start = shown.appointment_start.as_str();
    let end = shown
        .appointment_end
        .as_deref()
        .unwrap_or(shown.appointment_start.as_str());

    let siblings =
        db.overlapping_calls_for_closer(&shown.closer_id, &shown.call_id, start, end)?;

    let mut demoted = 0;
    for sibling in siblings {
        let Some(state) = Attendance::from_stored(sibling.attendance.as_deref()) else {
            continue;
        };
        if !matches!(
            state,
            Attendance::Scheduled | Attendance::WaitingForOutcome | Attendance::GhostedNoShow
        ) {
            continue;
        }

        let extra = ExtraUpdates {
            audit_detail: Some(format!("overlaps attended call {}", shown.call_id)),
            ..Default::default()
        };
        match transition_state(
            db,
            &sibling.call_id,
            &sibling.client_id,
            Attendance::Overbooked,
            "overlap_detected",
            &extra,
        ) {
            Ok(true) => demoted += 1,
            Ok(false) => {}
            Err(e) => {
                log::warn!(
                    "Failed to demote overlapping call {}: {}",
                    sibling.call_id,
                    e
                );
            }
        }
    }

    Ok(demoted)
}
