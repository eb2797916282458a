use rusqlite::params;

use super::*;
use crate::attendance::{Attendance, ExtraUpdates};
use crate::util::utc_now;

impl CallDb {
    // =========================================================================
    // Calls
    // =========================================================================

    /// Insert a new call row.
    pub fn insert_call(&self, call: &DbCall) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO calls (
                call_id, appointment_id, client_id, closer_id,
                appointment_start, appointment_end, timezone_origin,
                prospect_email, prospect_name, call_type,
                attendance, call_outcome, transcript_status, transcript_link,
                call_duration_seconds, processing_status,
                ingestion_source, source,
                cash_collected, revenue_generated, lost_reason, date_closed,
                created, last_modified
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                       ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                call.call_id,
                call.appointment_id,
                call.client_id,
                call.closer_id,
                call.appointment_start,
                call.appointment_end,
                call.timezone_origin,
                call.prospect_email,
                call.prospect_name,
                call.call_type,
                call.attendance,
                call.call_outcome,
                call.transcript_status,
                call.transcript_link,
                call.call_duration_seconds,
                call.processing_status,
                call.ingestion_source,
                call.source,
                call.cash_collected,
                call.revenue_generated,
                call.lost_reason,
                call.date_closed,
                call.created,
                call.last_modified,
            ],
        )?;
        Ok(())
    }

    /// Look up a single call by `(call_id, client_id)`.
    pub fn get_call(&self, call_id: &str, client_id: &str) -> Result<Option<DbCall>, DbError> {
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1 AND client_id = ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![call_id, client_id], map_call_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// The most recent call for `(client_id, appointment_id)`.
    ///
    /// Appointment ids are reusable after cancellation, so several rows may
    /// share one; reconciliation always decides against the newest.
    pub fn latest_call_for_appointment(
        &self,
        client_id: &str,
        appointment_id: &str,
    ) -> Result<Option<DbCall>, DbError> {
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE client_id = ?1 AND appointment_id = ?2
             ORDER BY created DESC, rowid DESC
             LIMIT 1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![client_id, appointment_id], map_call_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All calls for `(client_id, appointment_id)`, oldest first.
    pub fn calls_for_appointment(
        &self,
        client_id: &str,
        appointment_id: &str,
    ) -> Result<Vec<DbCall>, DbError> {
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE client_id = ?1 AND appointment_id = ?2
             ORDER BY created ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![client_id, appointment_id], map_call_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Update booking fields in place (reschedule / prospect correction).
    ///
    /// When `prospect` is `Some((email, name))` both prospect columns are
    /// replaced; `call_type` is only written when provided (classification
    /// upgrades, never demotions). `last_modified` is always refreshed.
    pub fn update_call_booking(
        &self,
        call_id: &str,
        appointment_start: &str,
        appointment_end: Option<&str>,
        prospect: Option<(&str, Option<&str>)>,
        call_type: Option<&str>,
    ) -> Result<(), DbError> {
        let mut sql = "UPDATE calls SET appointment_start = ?1, appointment_end = ?2, \
                       last_modified = ?3"
            .to_string();
        let mut bind: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(appointment_start.to_string()),
            Box::new(appointment_end.map(|s| s.to_string())),
            Box::new(utc_now()),
        ];
        let mut idx = 4;

        if let Some((email, name)) = prospect {
            sql.push_str(&format!(", prospect_email = ?{idx}"));
            bind.push(Box::new(email.to_string()));
            idx += 1;
            sql.push_str(&format!(", prospect_name = ?{idx}"));
            bind.push(Box::new(name.map(|s| s.to_string())));
            idx += 1;
        }
        if let Some(ct) = call_type {
            sql.push_str(&format!(", call_type = ?{idx}"));
            bind.push(Box::new(ct.to_string()));
            idx += 1;
        }

        sql.push_str(&format!(" WHERE call_id = ?{idx}"));
        bind.push(Box::new(call_id.to_string()));

        self.conn.execute(
            &sql,
            rusqlite::params_from_iter(bind.iter().map(|p| p.as_ref())),
        )?;
        Ok(())
    }

    // =========================================================================
    // Sweep predicates
    // =========================================================================

    /// Phase 1 candidates: never-touched calls whose meeting window has
    /// elapsed. Effective end is `appointment_end` when present, else
    /// `appointment_start`.
    pub fn calls_pending_wait(
        &self,
        now: &str,
        client_id: Option<&str>,
    ) -> Result<Vec<DbCall>, DbError> {
        let base = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE (attendance IS NULL OR attendance = 'Scheduled')
               AND datetime(COALESCE(appointment_end, appointment_start)) < datetime(?1)"
        );
        match client_id {
            Some(cid) => {
                let sql = format!("{base} AND client_id = ?2 ORDER BY appointment_start ASC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![now, cid], map_call_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
            None => {
                let sql = format!("{base} ORDER BY appointment_start ASC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![now], map_call_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
        }
    }

    /// Phase 2 candidates: calls waiting for an outcome whose effective end
    /// is older than the cutoff.
    pub fn calls_waiting_timed_out(
        &self,
        cutoff: &str,
        client_id: Option<&str>,
    ) -> Result<Vec<DbCall>, DbError> {
        let base = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE attendance = 'Waiting for Outcome'
               AND datetime(COALESCE(appointment_end, appointment_start)) < datetime(?1)"
        );
        match client_id {
            Some(cid) => {
                let sql = format!("{base} AND client_id = ?2 ORDER BY appointment_start ASC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![cutoff, cid], map_call_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
            None => {
                let sql = format!("{base} ORDER BY appointment_start ASC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![cutoff], map_call_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
        }
    }

    /// Polling-fallback candidates for one closer: still-null or waiting
    /// calls lacking any transcript signal.
    pub fn calls_awaiting_transcript(
        &self,
        closer_id: &str,
        client_id: Option<&str>,
    ) -> Result<Vec<DbCall>, DbError> {
        let base = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE closer_id = ?1
               AND (attendance IS NULL
                    OR attendance IN ('Scheduled', 'Waiting for Outcome'))
               AND (transcript_status IS NULL OR transcript_status = '')"
        );
        match client_id {
            Some(cid) => {
                let sql = format!("{base} AND client_id = ?2 ORDER BY appointment_start DESC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![closer_id, cid], map_call_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
            None => {
                let sql = format!("{base} ORDER BY appointment_start DESC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![closer_id], map_call_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
        }
    }

    /// Sibling calls for a closer (across all clients) overlapping the
    /// half-open window `[start, end)`. Siblings with no end time are
    /// excluded — no overlap claim can be made without one.
    pub fn overlapping_calls_for_closer(
        &self,
        closer_id: &str,
        exclude_call_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<DbCall>, DbError> {
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE closer_id = ?1
               AND call_id != ?2
               AND appointment_end IS NOT NULL
               AND datetime(appointment_start) < datetime(?4)
               AND datetime(appointment_end) > datetime(?3)
             ORDER BY appointment_start ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![closer_id, exclude_call_id, start, end], map_call_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Whether `(client_id, prospect_email)` has any call in a state only
    /// reachable through `Show` — the basis for Follow Up classification.
    pub fn has_show_reachable_call(
        &self,
        client_id: &str,
        prospect_email: &str,
    ) -> Result<bool, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT 1 FROM calls
             WHERE client_id = ?1
               AND prospect_email = ?2 COLLATE NOCASE
               AND attendance IN ('Show', 'Closed - Won', 'Lost', 'Deposit',
                                  'Follow Up', 'Disqualified', 'Not Pitched')
             LIMIT 1",
        )?;
        stmt.exists(params![client_id, prospect_email])
            .map_err(DbError::from)
    }

    // =========================================================================
    // Conditional attendance update
    // =========================================================================

    /// Compare-and-set the attendance column plus any extra field updates.
    ///
    /// The WHERE clause re-checks the expected *stored literal* (NULL and
    /// `'Scheduled'` are distinct at this level), so a write validated
    /// against a stale read affects zero rows. Returns whether the row
    /// changed. Callers own transaction and audit-row responsibilities —
    /// use `attendance::transition_state`, not this, for state changes.
    pub fn cas_update_attendance(
        &self,
        call_id: &str,
        client_id: &str,
        expected_raw: Option<&str>,
        target: Attendance,
        extra: &ExtraUpdates,
    ) -> Result<bool, DbError> {
        let mut sql = "UPDATE calls SET attendance = ?1, last_modified = ?2".to_string();
        let mut bind: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
            Box::new(target.as_str().to_string()),
            Box::new(utc_now()),
        ];
        let mut idx = 3;

        if let Some(ref v) = extra.transcript_status {
            sql.push_str(&format!(", transcript_status = ?{idx}"));
            bind.push(Box::new(v.clone()));
            idx += 1;
        }
        if let Some(ref v) = extra.transcript_link {
            sql.push_str(&format!(", transcript_link = ?{idx}"));
            bind.push(Box::new(v.clone()));
            idx += 1;
        }
        if let Some(v) = extra.call_duration_seconds {
            sql.push_str(&format!(", call_duration_seconds = ?{idx}"));
            bind.push(Box::new(v));
            idx += 1;
        }
        if let Some(ref v) = extra.call_outcome {
            sql.push_str(&format!(", call_outcome = ?{idx}"));
            bind.push(Box::new(v.clone()));
            idx += 1;
        }
        if let Some(ref v) = extra.processing_status {
            sql.push_str(&format!(", processing_status = ?{idx}"));
            bind.push(Box::new(v.clone()));
            idx += 1;
        }
        if let Some(ref v) = extra.date_closed {
            sql.push_str(&format!(", date_closed = ?{idx}"));
            bind.push(Box::new(v.clone()));
            idx += 1;
        }

        sql.push_str(&format!(
            " WHERE call_id = ?{} AND client_id = ?{} \
             AND COALESCE(attendance, '') = COALESCE(?{}, '')",
            idx,
            idx + 1,
            idx + 2
        ));
        bind.push(Box::new(call_id.to_string()));
        bind.push(Box::new(client_id.to_string()));
        bind.push(Box::new(expected_raw.map(|s| s.to_string())));

        let affected = self.conn.execute(
            &sql,
            rusqlite::params_from_iter(bind.iter().map(|p| p.as_ref())),
        )?;
        Ok(affected > 0)
    }
}
