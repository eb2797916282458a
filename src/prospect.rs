//! Prospect identity extraction and call-type classification.
//!
//! Extraction is a best-effort heuristic with an explicit fallback chain:
//! attendee list, then event title scrape, then the `"unknown"` sentinel.
//! It never panics and its output is advisory — reconciliation correctness
//! does not depend on it.

use regex::Regex;

use crate::db::{CallDb, DbError};
use crate::types::{CallType, CloserContext, NormalizedCalendarEvent};

/// Extracted prospect identity. `email` may be the `"unknown"` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedProspect {
    pub email: String,
    pub name: Option<String>,
}

impl ExtractedProspect {
    pub fn unknown() -> Self {
        ExtractedProspect {
            email: "unknown".to_string(),
            name: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.email == "unknown"
    }
}

/// Pick the prospect out of a normalized event.
///
/// The first attendee whose email does not match the closer's registered
/// email is the prospect; their display name wins, else a name derived from
/// the email local-part. With no such attendee, a name is scraped from the
/// event title. Falls back to `"unknown"` / no name.
pub fn extract_prospect(
    event: &NormalizedCalendarEvent,
    closer: &CloserContext,
) -> ExtractedProspect {
    let closer_email = closer.work_email.trim().to_lowercase();

    for attendee in &event.attendees {
        let email = attendee.email.trim().to_lowercase();
        if email.is_empty() || email == closer_email {
            continue;
        }
        let name = attendee
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| n.to_string())
            .or_else(|| name_from_email(&email));
        return ExtractedProspect { email, name };
    }

    if let Some(name) = name_from_title(&event.title, &closer.name) {
        return ExtractedProspect {
            email: "unknown".to_string(),
            name: Some(name),
        };
    }

    ExtractedProspect::unknown()
}

/// Derive a display name from an email local-part.
///
/// Dot/underscore/hyphen separated tokens, capitalized, trailing digits
/// preserved: `john.smith2@x.com` → `John Smith2`.
pub fn name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next()?.trim();
    if local.is_empty() || local.eq_ignore_ascii_case("unknown") {
        return None;
    }

    let tokens: Vec<String> = local
        .split(['.', '_', '-'])
        .filter(|t| !t.is_empty())
        .map(capitalize)
        .collect();

    if tokens.is_empty() || !tokens.iter().any(|t| t.chars().any(|c| c.is_alphabetic())) {
        return None;
    }
    Some(tokens.join(" "))
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Scrape a prospect name out of an event title.
///
/// Removes known filler phrases, the closer's own name, separator noise,
/// and trailing sequence markers ("Double Booking 2"), preserving
/// multi-person connectors ("&"). Returns `None` when nothing name-like
/// remains.
pub fn name_from_title(title: &str, closer_name: &str) -> Option<String> {
    let mut working = format!(" {} ", title.trim());
    if working.trim().is_empty() {
        return None;
    }

    // The closer's full name, then its individual parts ("Call with Alex"
    // when the closer is "Alex Morgan").
    let closer_name = closer_name.trim();
    if !closer_name.is_empty() {
        if let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(closer_name))) {
            working = re.replace_all(&working, " ").into_owned();
        }
        for part in closer_name.split_whitespace().filter(|p| p.len() > 2) {
            if let Ok(re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(part))) {
                working = re.replace_all(&working, " ").into_owned();
            }
        }
    }

    // Known filler phrases, longest first so "discovery call" is consumed
    // before "call".
    const FILLER_PHRASES: &[&str] = &[
        "strategy session",
        "discovery call",
        "discovery session",
        "intro call",
        "introduction",
        "sales call",
        "closing call",
        "demo call",
        "double booking",
        "follow[- ]?up call",
        "follow[- ]?up",
        "one[- ]on[- ]one",
        "1:1",
        "1 on 1",
        "check[- ]?in",
        "kick[- ]?off",
        "consultation",
        "call with",
        "meeting with",
        "google meet",
        "zoom",
        "demo",
        "call",
        "meeting",
        "session",
        "sync",
    ];
    if let Ok(re) = Regex::new(&format!(r"(?i)\b({})\b", FILLER_PHRASES.join("|"))) {
        working = re.replace_all(&working, " ").into_owned();
    }
    if let Ok(re) = Regex::new(r"(?i)\bw/") {
        working = re.replace_all(&working, " ").into_owned();
    }

    // Trailing sequence markers: "... 2", "... #3"
    if let Ok(re) = Regex::new(r"[\s\-–—#]*\d+\s*$") {
        working = re.replace(&working, " ").into_owned();
    }

    // Separator noise → spaces; "&" survives as a connector
    working = working
        .chars()
        .map(|c| match c {
            '|' | ':' | ';' | ',' | '•' | '·' | '/' | '\\' | '<' | '>' | '(' | ')' | '[' | ']'
            | '-' | '–' | '—' => ' ',
            other => other,
        })
        .collect();

    let mut tokens: Vec<&str> = working.split_whitespace().collect();

    // Strip connector words left dangling at either edge
    const EDGE_CONNECTORS: &[&str] = &["with", "and", "x", "for", "the", "a", "an", "&", "+"];
    while let Some(first) = tokens.first() {
        if EDGE_CONNECTORS.contains(&first.to_lowercase().as_str()) {
            tokens.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = tokens.last() {
        if EDGE_CONNECTORS.contains(&last.to_lowercase().as_str()) {
            tokens.pop();
        } else {
            break;
        }
    }

    if tokens.is_empty() || !tokens.iter().any(|t| t.chars().any(|c| c.is_alphabetic())) {
        return None;
    }
    Some(tokens.join(" "))
}

/// Classify a booking as First Call or Follow Up from prospect history.
///
/// Follow Up when `(client_id, prospect_email)` already has a call in a
/// state only reachable through `Show`. The `"unknown"` sentinel always
/// classifies as First Call.
pub fn determine_call_type(
    db: &CallDb,
    client_id: &str,
    prospect_email: &str,
) -> Result<CallType, DbError> {
    if prospect_email.is_empty() || prospect_email.eq_ignore_ascii_case("unknown") {
        return Ok(CallType::FirstCall);
    }
    if db.has_show_reachable_call(client_id, prospect_email)? {
        Ok(CallType::FollowUp)
    } else {
        Ok(CallType::FirstCall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutil::{insert_call, CallSeed};
    use crate::types::{CalendarEventKind, EventAttendee, EventStatus};
    use chrono::Utc;

    fn make_closer() -> CloserContext {
        CloserContext {
            closer_id: "closer-1".to_string(),
            client_id: "client-1".to_string(),
            name: "Alex Morgan".to_string(),
            work_email: "alex@agency.io".to_string(),
            transcript_provider: Some("fireflies".to_string()),
            status: "active".to_string(),
        }
    }

    fn make_event(title: &str, attendees: Vec<EventAttendee>) -> NormalizedCalendarEvent {
        NormalizedCalendarEvent {
            event_id: "evt-1".to_string(),
            provider: "google".to_string(),
            kind: CalendarEventKind::Booking,
            title: title.to_string(),
            start_time: Utc::now(),
            end_time: None,
            original_timezone: Some("America/New_York".to_string()),
            organizer_email: Some("alex@agency.io".to_string()),
            attendees,
            status: EventStatus::Confirmed,
            declined_attendees: vec![],
        }
    }

    fn attendee(email: &str, name: Option<&str>) -> EventAttendee {
        EventAttendee {
            email: email.to_string(),
            name: name.map(|s| s.to_string()),
            is_organizer: false,
            response_status: Some("accepted".to_string()),
        }
    }

    #[test]
    fn test_first_non_closer_attendee_is_prospect() {
        let event = make_event(
            "Discovery Call",
            vec![
                attendee("alex@agency.io", Some("Alex Morgan")),
                attendee("john@x.com", Some("John Carter")),
                attendee("jane@x.com", Some("Jane Doe")),
            ],
        );
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.email, "john@x.com");
        assert_eq!(p.name.as_deref(), Some("John Carter"));
    }

    #[test]
    fn test_closer_email_match_is_case_insensitive() {
        let event = make_event(
            "Discovery Call",
            vec![attendee("Alex@Agency.IO", None), attendee("sam@x.com", None)],
        );
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.email, "sam@x.com");
        assert_eq!(p.name.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_name_falls_back_to_email_local_part() {
        let event = make_event(
            "Discovery Call",
            vec![attendee("john.smith2@x.com", None)],
        );
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.email, "john.smith2@x.com");
        assert_eq!(p.name.as_deref(), Some("John Smith2"));
    }

    #[test]
    fn test_title_scrape_when_no_attendees() {
        let event = make_event("Strategy Session with Jordan Reyes", vec![]);
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.email, "unknown");
        assert_eq!(p.name.as_deref(), Some("Jordan Reyes"));
    }

    #[test]
    fn test_title_scrape_removes_closer_name() {
        let event = make_event("Alex Morgan <> Priya Patel", vec![]);
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.name.as_deref(), Some("Priya Patel"));
    }

    #[test]
    fn test_title_scrape_removes_sequence_marker() {
        let event = make_event("Jordan Reyes Double Booking 2", vec![]);
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.name.as_deref(), Some("Jordan Reyes"));
    }

    #[test]
    fn test_title_scrape_preserves_ampersand() {
        let event = make_event("Call with Dana & Chris Miller", vec![]);
        let p = extract_prospect(&event, &make_closer());
        assert_eq!(p.name.as_deref(), Some("Dana & Chris Miller"));
    }

    #[test]
    fn test_pure_filler_title_yields_unknown() {
        let event = make_event("Discovery Call", vec![]);
        let p = extract_prospect(&event, &make_closer());
        assert!(p.is_unknown());
        assert_eq!(p.name, None);
    }

    #[test]
    fn test_empty_title_yields_unknown() {
        let event = make_event("", vec![]);
        let p = extract_prospect(&event, &make_closer());
        assert!(p.is_unknown());
    }

    #[test]
    fn test_never_panics_on_garbage() {
        let closer = make_closer();
        for title in [
            "|||:::///",
            "1234567",
            "((((",
            "w/ w/ w/",
            "демо звонок", // non-ASCII survives or falls through, never panics
            "a & b & c & d 99999999999999999999",
        ] {
            let event = make_event(title, vec![]);
            let _ = extract_prospect(&event, &closer);
        }
        assert!(name_from_email("@").is_none());
        assert!(name_from_email("").is_none());
        assert!(name_from_email("123@x.com").is_none());
    }

    #[test]
    fn test_name_from_email_variants() {
        assert_eq!(name_from_email("jane_doe@x.com").as_deref(), Some("Jane Doe"));
        assert_eq!(name_from_email("mike-oh@x.com").as_deref(), Some("Mike Oh"));
        assert_eq!(name_from_email("sam@x.com").as_deref(), Some("Sam"));
        assert!(name_from_email("unknown@x.com").is_none());
    }

    #[test]
    fn test_call_type_unknown_is_first_call() {
        let db = CallDb::open_in_memory().expect("open");
        assert_eq!(
            determine_call_type(&db, "client-1", "unknown").expect("classify"),
            CallType::FirstCall
        );
        assert_eq!(
            determine_call_type(&db, "client-1", "").expect("classify"),
            CallType::FirstCall
        );
    }

    #[test]
    fn test_call_type_requires_show_reachable_history() {
        let db = CallDb::open_in_memory().expect("open");

        // A prior booking that never happened does not make a Follow Up
        insert_call(
            &db,
            CallSeed::new("a1", "client-1", "closer-1")
                .prospect("john@x.com", Some("John"))
                .attendance(Some("Canceled")),
        );
        assert_eq!(
            determine_call_type(&db, "client-1", "john@x.com").expect("classify"),
            CallType::FirstCall
        );

        // A prior Show does
        insert_call(
            &db,
            CallSeed::new("a2", "client-1", "closer-1")
                .prospect("john@x.com", Some("John"))
                .attendance(Some("Show")),
        );
        assert_eq!(
            determine_call_type(&db, "client-1", "john@x.com").expect("classify"),
            CallType::FollowUp
        );

        // Outcome states reached through Show also count
        insert_call(
            &db,
            CallSeed::new("a3", "client-1", "closer-1")
                .prospect("kate@x.com", None)
                .attendance(Some("Closed - Won")),
        );
        assert_eq!(
            determine_call_type(&db, "client-1", "kate@x.com").expect("classify"),
            CallType::FollowUp
        );
    }

    #[test]
    fn test_call_type_respects_client_isolation() {
        let db = CallDb::open_in_memory().expect("open");
        insert_call(
            &db,
            CallSeed::new("a1", "client-1", "closer-1")
                .prospect("john@x.com", None)
                .attendance(Some("Show")),
        );

        assert_eq!(
            determine_call_type(&db, "client-2", "john@x.com").expect("classify"),
            CallType::FirstCall
        );
    }
}
