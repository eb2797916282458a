//! Timer-driven reconciliation sweep.
//!
//! Three phases in one pass:
//!   1.   stale never-touched calls → `Waiting for Outcome`
//!   1.5  per-closer transcript polling fallback for missing webhooks
//!   2.   long-waiting calls → `Ghosted - No Show`
//!
//! The sweep is idempotent — re-running selects nothing it already moved —
//! and never fails as a whole because of one record: per-record and
//! per-closer errors are counted into the summary and alerted in aggregate.
//! A store-level failure is caught at the top, alerted at critical
//! severity, and reported as a zero-progress summary so the timer loop
//! survives.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::alerts::{Alert, Alerter, Severity};
use crate::attendance::{transition_state, Attendance, ExtraUpdates};
use crate::db::DbCloser;
use crate::state::AppState;
use crate::transcript::matcher::match_recording_to_call;
use crate::transcript::pipeline::{IngestHints, TranscriptIngest};
use crate::transcript::provider::TranscriptProvider;
use crate::util::format_utc;

/// Result of one sweep pass. Always returned, even on total failure.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    /// Records examined across all phases.
    pub checked: usize,
    /// Phase 1 promotions into Waiting for Outcome.
    pub waiting: usize,
    /// Phase 2 timeouts into Ghosted - No Show.
    pub timed_out: usize,
    /// Phase 1.5 recordings fed into the transcript pipeline.
    pub matched: usize,
    /// Per-record and per-closer failures absorbed along the way.
    pub errors: usize,
}

pub struct Sweeper {
    state: Arc<AppState>,
    provider: Arc<dyn TranscriptProvider>,
    ingest: Arc<dyn TranscriptIngest>,
    alerter: Arc<dyn Alerter>,
    /// Single-flight guard: an overlapping timer fire is a no-op. This is a
    /// cooperative in-process guard — multi-instance deployments must
    /// externalize the lock (e.g. a distributed lease) to keep the same
    /// guarantee.
    in_flight: AtomicBool,
}

impl Sweeper {
    pub fn new(
        state: Arc<AppState>,
        provider: Arc<dyn TranscriptProvider>,
        ingest: Arc<dyn TranscriptIngest>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self {
            state,
            provider,
            ingest,
            alerter,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Background loop: sweep, sleep, repeat. The interval is re-read each
    /// cycle so config changes apply without a restart.
    pub async fn run(self: Arc<Self>) {
        log::info!("Reconciliation sweeper started");
        loop {
            let summary = self.run_sweep(None).await;
            log::info!(
                "Sweep complete: checked={} waiting={} timed_out={} matched={} errors={}",
                summary.checked,
                summary.waiting,
                summary.timed_out,
                summary.matched,
                summary.errors
            );

            let interval_minutes = self.state.fresh_config().ghost_check_interval_minutes.max(1);
            tokio::time::sleep(Duration::from_secs(interval_minutes * 60)).await;
        }
    }

    /// One sweep pass. `None` sweeps all tenants; `Some` scopes every phase
    /// to one client for on-demand administrative runs.
    pub async fn run_sweep(&self, client_id: Option<&str>) -> SweepSummary {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("Sweep already in flight; this invocation is a no-op");
            return SweepSummary::default();
        }

        let result = self.sweep_inner(client_id).await;
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(summary) => {
                if summary.errors > 0 {
                    self.alerter.send(Alert {
                        severity: Severity::Warning,
                        title: "Reconciliation sweep finished with errors".to_string(),
                        details: format!(
                            "{} record(s) failed; checked={} waiting={} timed_out={} matched={}",
                            summary.errors,
                            summary.checked,
                            summary.waiting,
                            summary.timed_out,
                            summary.matched
                        ),
                        error: None,
                        suggested_action: Some(
                            "Inspect warnings in the service log".to_string(),
                        ),
                    });
                }
                summary
            }
            Err(e) => {
                log::error!("Reconciliation sweep failed: {}", e);
                self.alerter.send(Alert {
                    severity: Severity::Critical,
                    title: "Reconciliation sweep failed".to_string(),
                    details: "The sweep made no progress this cycle".to_string(),
                    error: Some(e),
                    suggested_action: Some("Check database availability".to_string()),
                });
                SweepSummary::default()
            }
        }
    }

    async fn sweep_inner(&self, client_id: Option<&str>) -> Result<SweepSummary, String> {
        // Read fresh every invocation — both cutoffs are hot-reloadable
        let config = self.state.fresh_config();
        let mut summary = SweepSummary::default();
        let now = Utc::now();

        // Phase 1: the moment the meeting window has elapsed, a untouched
        // call starts waiting for its outcome. No timeout offset.
        let pending = self
            .state
            .with_db_ref(|db| db.calls_pending_wait(&format_utc(now), client_id))?;
        summary.checked += pending.len();
        for call in &pending {
            let result = self.state.with_db_ref(|db| {
                transition_state(
                    db,
                    &call.call_id,
                    &call.client_id,
                    Attendance::WaitingForOutcome,
                    "appointment_time_passed",
                    &ExtraUpdates::default(),
                )
            });
            match result {
                Ok(true) => summary.waiting += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.errors += 1;
                    log::warn!("Phase 1 transition failed for call {}: {}", call.call_id, e);
                }
            }
        }

        // Phase 1.5: poll the transcript provider for closers that have a
        // credential. One closer's failure never aborts the rest.
        let closers = self
            .state
            .with_db_ref(|db| db.credentialed_closers(client_id))?;
        for closer in &closers {
            if let Err(e) = self
                .poll_closer(closer, client_id, config.transcript_lookback_hours, &mut summary)
                .await
            {
                summary.errors += 1;
                log::warn!(
                    "Transcript polling failed for closer {}: {}",
                    closer.closer_id,
                    e
                );
            }
        }

        // Phase 2: waiting calls past the configured timeout are ghosted,
        // with the missing transcript recorded in the same atomic update.
        let cutoff = now - chrono::Duration::minutes(config.transcript_timeout_minutes);
        let stale = self
            .state
            .with_db_ref(|db| db.calls_waiting_timed_out(&format_utc(cutoff), client_id))?;
        summary.checked += stale.len();
        for call in &stale {
            let extra = ExtraUpdates {
                transcript_status: Some("No Transcript".to_string()),
                ..Default::default()
            };
            let result = self.state.with_db_ref(|db| {
                transition_state(
                    db,
                    &call.call_id,
                    &call.client_id,
                    Attendance::GhostedNoShow,
                    "transcript_timeout",
                    &extra,
                )
            });
            match result {
                Ok(true) => summary.timed_out += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.errors += 1;
                    log::warn!("Phase 2 transition failed for call {}: {}", call.call_id, e);
                }
            }
        }

        Ok(summary)
    }

    /// Poll one closer's recordings and feed matches into the transcript
    /// pipeline with explicit record hints. A call matched once in this
    /// pass is not matched again, and neither is a recording.
    async fn poll_closer(
        &self,
        closer: &DbCloser,
        client_id: Option<&str>,
        lookback_hours: i64,
        summary: &mut SweepSummary,
    ) -> Result<(), String> {
        let pending = self
            .state
            .with_db_ref(|db| db.calls_awaiting_transcript(&closer.closer_id, client_id))?;
        if pending.is_empty() {
            return Ok(());
        }
        summary.checked += pending.len();

        // Provider round-trip happens outside any DB lock
        let recordings = self
            .provider
            .recent_recordings(closer, lookback_hours)
            .await
            .map_err(|e| e.to_string())?;
        if recordings.is_empty() {
            return Ok(());
        }

        let mut used: HashSet<String> = HashSet::new();
        for call in &pending {
            let Some(recording) = match_recording_to_call(call, &recordings, &used) else {
                continue;
            };
            used.insert(recording.recording_id.clone());

            let hints = IngestHints {
                call_id: call.call_id.clone(),
                client_id: call.client_id.clone(),
            };
            let ingest_result = {
                let guard = self
                    .state
                    .db
                    .lock()
                    .map_err(|_| "Lock poisoned".to_string())?;
                let db = guard
                    .as_ref()
                    .ok_or_else(|| "Database not initialized".to_string())?;
                self.ingest.ingest(db, recording, &hints)
            };
            match ingest_result {
                Ok(_) => {
                    summary.matched += 1;
                    log::info!(
                        "Polled transcript {} matched call {} ({})",
                        recording.recording_id,
                        call.call_id,
                        closer.closer_id
                    );
                }
                Err(e) => {
                    summary.errors += 1;
                    log::warn!("Transcript ingest failed for call {}: {}", call.call_id, e);
                }
            }
        }

        Ok(())
    }
}
