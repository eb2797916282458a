//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `calls` table — one attempted or completed sales
/// conversation.
///
/// `attendance` is stored raw: NULL and the legacy literal `"Scheduled"` are
/// equivalent initial values. Normalization to the canonical enum happens on
/// read (`Attendance::from_stored`); audit entries preserve the stored
/// literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCall {
    pub call_id: String,
    /// External calendar event id. Not unique over time — a cancelled slot's
    /// id may be reused by the calendar provider.
    pub appointment_id: String,
    pub client_id: String,
    pub closer_id: String,
    pub appointment_start: String,
    pub appointment_end: Option<String>,
    pub timezone_origin: Option<String>,
    /// `"unknown"` sentinel permitted.
    pub prospect_email: String,
    pub prospect_name: Option<String>,
    /// "First Call" | "Follow Up". Never demoted once Follow Up.
    pub call_type: String,
    pub attendance: Option<String>,
    pub call_outcome: Option<String>,
    pub transcript_status: Option<String>,
    pub transcript_link: Option<String>,
    pub call_duration_seconds: Option<i64>,
    pub processing_status: Option<String>,
    /// "calendar" | "transcript".
    pub ingestion_source: String,
    /// Human label for the originating provider.
    pub source: Option<String>,
    pub cash_collected: f64,
    pub revenue_generated: f64,
    pub lost_reason: Option<String>,
    pub date_closed: Option<String>,
    pub created: String,
    pub last_modified: String,
}

/// A row from the `closers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCloser {
    pub closer_id: String,
    pub client_id: String,
    pub name: String,
    pub work_email: String,
    pub transcript_provider: Option<String>,
    /// Closers with a non-empty key participate in polling fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_api_key: Option<String>,
    pub status: String,
}

/// A row from the `prospects` table. Payment totals are written by the
/// payment collaborator; this core only creates the row lazily and reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbProspect {
    pub prospect_id: String,
    pub client_id: String,
    pub prospect_email: String,
    pub prospect_name: Option<String>,
    pub deal_status: String,
    pub total_cash_collected: f64,
    pub total_revenue: f64,
    pub first_seen: String,
    pub last_seen: String,
}

/// A row from the append-only `audit_log` table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAuditEntry {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub field_changed: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub trigger_source: String,
    pub trigger_detail: Option<String>,
    pub client_id: String,
    pub timestamp: String,
}

/// Borrowed input for an audit insert.
pub struct NewAuditEntry<'a> {
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub action: &'a str,
    pub field_changed: Option<&'a str>,
    pub old_value: Option<&'a str>,
    pub new_value: Option<&'a str>,
    pub trigger_source: &'a str,
    pub trigger_detail: Option<&'a str>,
    pub client_id: &'a str,
}

/// Row mapper for `calls` SELECT queries (24 columns, schema order).
pub(crate) fn map_call_row(row: &rusqlite::Row) -> rusqlite::Result<DbCall> {
    Ok(DbCall {
        call_id: row.get(0)?,
        appointment_id: row.get(1)?,
        client_id: row.get(2)?,
        closer_id: row.get(3)?,
        appointment_start: row.get(4)?,
        appointment_end: row.get(5)?,
        timezone_origin: row.get(6)?,
        prospect_email: row.get(7)?,
        prospect_name: row.get(8)?,
        call_type: row.get(9)?,
        attendance: row.get(10)?,
        call_outcome: row.get(11)?,
        transcript_status: row.get(12)?,
        transcript_link: row.get(13)?,
        call_duration_seconds: row.get(14)?,
        processing_status: row.get(15)?,
        ingestion_source: row.get(16)?,
        source: row.get(17)?,
        cash_collected: row.get(18)?,
        revenue_generated: row.get(19)?,
        lost_reason: row.get(20)?,
        date_closed: row.get(21)?,
        created: row.get(22)?,
        last_modified: row.get(23)?,
    })
}

/// The SELECT column list matching [`map_call_row`].
pub(crate) const CALL_COLUMNS: &str = "call_id, appointment_id, client_id, closer_id, \
     appointment_start, appointment_end, timezone_origin, \
     prospect_email, prospect_name, call_type, \
     attendance, call_outcome, transcript_status, transcript_link, \
     call_duration_seconds, processing_status, \
     ingestion_source, source, \
     cash_collected, revenue_generated, lost_reason, date_closed, \
     created, last_modified";

/// Row mapper for `closers` SELECT queries.
pub(crate) fn map_closer_row(row: &rusqlite::Row) -> rusqlite::Result<DbCloser> {
    Ok(DbCloser {
        closer_id: row.get(0)?,
        client_id: row.get(1)?,
        name: row.get(2)?,
        work_email: row.get(3)?,
        transcript_provider: row.get(4)?,
        provider_api_key: row.get(5)?,
        status: row.get(6)?,
    })
}

pub(crate) const CLOSER_COLUMNS: &str =
    "closer_id, client_id, name, work_email, transcript_provider, provider_api_key, status";
