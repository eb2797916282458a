//! Shared test fixtures for the database layer and everything built on it.

use chrono::{Duration, Utc};

use super::*;
use crate::util::{format_utc, utc_now};

/// Builder for seeding call rows in tests. Times are offsets in minutes
/// relative to now so fixtures stay valid regardless of wall clock.
pub(crate) struct CallSeed {
    pub appointment_id: String,
    pub client_id: String,
    pub closer_id: String,
    pub start_offset_minutes: i64,
    pub duration_minutes: Option<i64>,
    pub attendance: Option<String>,
    pub prospect_email: String,
    pub prospect_name: Option<String>,
    pub call_type: String,
    pub transcript_status: Option<String>,
}

impl CallSeed {
    pub fn new(appointment_id: &str, client_id: &str, closer_id: &str) -> Self {
        Self {
            appointment_id: appointment_id.to_string(),
            client_id: client_id.to_string(),
            closer_id: closer_id.to_string(),
            start_offset_minutes: 60,
            duration_minutes: Some(60),
            attendance: None,
            prospect_email: "unknown".to_string(),
            prospect_name: None,
            call_type: "First Call".to_string(),
            transcript_status: None,
        }
    }

    pub fn attendance(mut self, value: Option<&str>) -> Self {
        self.attendance = value.map(|s| s.to_string());
        self
    }

    pub fn start_offset(mut self, minutes: i64) -> Self {
        self.start_offset_minutes = minutes;
        self
    }

    pub fn duration(mut self, minutes: Option<i64>) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn prospect(mut self, email: &str, name: Option<&str>) -> Self {
        self.prospect_email = email.to_string();
        self.prospect_name = name.map(|s| s.to_string());
        self
    }

    pub fn call_type(mut self, value: &str) -> Self {
        self.call_type = value.to_string();
        self
    }

    pub fn transcript_status(mut self, value: Option<&str>) -> Self {
        self.transcript_status = value.map(|s| s.to_string());
        self
    }
}

/// Insert a call from a seed and return the stored row.
pub(crate) fn insert_call(db: &CallDb, seed: CallSeed) -> DbCall {
    let start = Utc::now() + Duration::minutes(seed.start_offset_minutes);
    let end = seed
        .duration_minutes
        .map(|d| format_utc(start + Duration::minutes(d)));
    let now = utc_now();

    let call = DbCall {
        call_id: uuid::Uuid::new_v4().to_string(),
        appointment_id: seed.appointment_id,
        client_id: seed.client_id,
        closer_id: seed.closer_id,
        appointment_start: format_utc(start),
        appointment_end: end,
        timezone_origin: Some("America/New_York".to_string()),
        prospect_email: seed.prospect_email,
        prospect_name: seed.prospect_name,
        call_type: seed.call_type,
        attendance: seed.attendance,
        call_outcome: None,
        transcript_status: seed.transcript_status,
        transcript_link: None,
        call_duration_seconds: None,
        processing_status: None,
        ingestion_source: "calendar".to_string(),
        source: Some("google".to_string()),
        cash_collected: 0.0,
        revenue_generated: 0.0,
        lost_reason: None,
        date_closed: None,
        created: now.clone(),
        last_modified: now,
    };
    db.insert_call(&call).expect("insert call seed");
    call
}

/// Insert a closer row.
pub(crate) fn insert_closer(
    db: &CallDb,
    closer_id: &str,
    client_id: &str,
    name: &str,
    work_email: &str,
    provider_api_key: Option<&str>,
) -> DbCloser {
    let closer = DbCloser {
        closer_id: closer_id.to_string(),
        client_id: client_id.to_string(),
        name: name.to_string(),
        work_email: work_email.to_string(),
        transcript_provider: provider_api_key.map(|_| "fireflies".to_string()),
        provider_api_key: provider_api_key.map(|s| s.to_string()),
        status: "active".to_string(),
    };
    db.upsert_closer(&closer).expect("insert closer seed");
    closer
}
