//! Recording → call correlation for the polling fallback.
//!
//! A recording matches a waiting call when their start times are within a
//! fixed tolerance and the recording carries non-empty transcript content.
//! Nearest start wins among candidates.

use std::collections::HashSet;

use crate::db::DbCall;
use crate::util::parse_utc;

use super::provider::Recording;

/// Maximum gap between scheduled start and recording start.
pub const MATCH_TOLERANCE_MINUTES: i64 = 30;

/// Find the best recording for a call, skipping recordings already consumed
/// in this sweep pass.
pub fn match_recording_to_call<'a>(
    call: &DbCall,
    recordings: &'a [Recording],
    used: &HashSet<String>,
) -> Option<&'a Recording> {
    let scheduled = parse_utc(&call.appointment_start)?;

    let mut best: Option<(&Recording, i64)> = None;
    for recording in recordings {
        if used.contains(&recording.recording_id) {
            continue;
        }
        if recording.transcript_text.trim().is_empty() {
            continue;
        }
        let diff = (recording.started_at - scheduled).num_minutes().abs();
        if diff > MATCH_TOLERANCE_MINUTES {
            continue;
        }
        if best.map_or(true, |(_, d)| diff < d) {
            best = Some((recording, diff));
        }
    }

    best.map(|(recording, _)| recording)
}
