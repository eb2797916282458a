//! Transcript ingest.
//!
//! The sweeper feeds polled matches through [`TranscriptIngest`] with
//! explicit hints so the pipeline updates the matched record instead of
//! running its own correlation and risking a duplicate.

use crate::attendance::{transition_state, Attendance, ExtraUpdates};
use crate::db::CallDb;

use super::provider::Recording;

/// Forces the pipeline onto a specific record.
#[derive(Debug, Clone)]
pub struct IngestHints {
    pub call_id: String,
    pub client_id: String,
}

pub trait TranscriptIngest: Send + Sync {
    /// Apply a recording to the hinted call. Returns whether a state change
    /// landed — `false` means the record was already resolved, which is a
    /// normal outcome for re-polled recordings, not an error.
    fn ingest(
        &self,
        db: &CallDb,
        recording: &Recording,
        hints: &IngestHints,
    ) -> Result<bool, String>;
}

/// Built-in ingest: a transcript proves attendance. Transitions the call to
/// `Show` with transcript metadata in the same atomic update. Because the
/// state machine allows `Ghosted - No Show → Show` and
/// `No Recording → Show`, a late transcript recovers calls the timeout
/// already wrote off.
pub struct TranscriptPipeline;

impl TranscriptIngest for TranscriptPipeline {
    fn ingest(
        &self,
        db: &CallDb,
        recording: &Recording,
        hints: &IngestHints,
    ) -> Result<bool, String> {
        let extra = ExtraUpdates {
            transcript_status: Some("Processed".to_string()),
            transcript_link: recording.share_url.clone(),
            call_duration_seconds: recording.duration_seconds,
            processing_status: Some("completed".to_string()),
            audit_detail: Some(format!("recording {}", recording.recording_id)),
            ..Default::default()
        };

        transition_state(
            db,
            &hints.call_id,
            &hints.client_id,
            Attendance::Show,
            "transcript_received",
            &extra,
        )
        .map_err(|e| e.to_string())
    }
}
