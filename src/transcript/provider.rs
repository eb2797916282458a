//! Transcript provider API client.
//!
//! Push webhooks are the primary transcript path; this client exists for
//! the sweeper's polling fallback when webhooks go missing. Auth is the
//! closer's own provider credential — each closer connects their own
//! recorder account.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::db::DbCloser;
use crate::util::format_utc;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Provider credential rejected")]
    AuthRejected,

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Closer has no provider credential")]
    MissingCredential,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

/// A recording as returned by the transcript provider, normalized.
#[derive(Debug, Clone)]
pub struct Recording {
    pub recording_id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    /// Full transcript text. Empty means the recorder joined but captured
    /// nothing usable — such recordings never match a call.
    pub transcript_text: String,
    pub share_url: Option<String>,
    /// Original provider payload, passed through to the ingest pipeline.
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Recordings hosted by this closer within the lookback window.
    async fn recent_recordings(
        &self,
        closer: &DbCloser,
        lookback_hours: i64,
    ) -> Result<Vec<Recording>, ProviderError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    started_at: Option<String>,
    #[serde(default)]
    duration_seconds: Option<i64>,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    share_url: Option<String>,
}

pub struct HttpTranscriptProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranscriptProvider {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TranscriptProvider for HttpTranscriptProvider {
    async fn recent_recordings(
        &self,
        closer: &DbCloser,
        lookback_hours: i64,
    ) -> Result<Vec<Recording>, ProviderError> {
        let api_key = closer
            .provider_api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingCredential)?;

        let since = format_utc(Utc::now() - Duration::hours(lookback_hours));

        let resp = self
            .client
            .get(format!("{}/v1/recordings", self.base_url))
            .bearer_auth(api_key)
            .query(&[("since", since.as_str()), ("host", closer.work_email.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ProviderError::AuthRejected);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let items = body
            .get("recordings")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut recordings = Vec::with_capacity(items.len());
        for raw in items {
            let parsed: RecordingRaw = serde_json::from_value(raw.clone())
                .map_err(|e| ProviderError::Decode(e.to_string()))?;

            // A recording without a start time can't be correlated to a
            // scheduled call; drop it rather than guessing.
            let Some(started_at) = parsed
                .started_at
                .as_deref()
                .and_then(crate::util::parse_utc)
            else {
                continue;
            };

            recordings.push(Recording {
                recording_id: parsed.id,
                title: parsed.title.unwrap_or_default(),
                started_at,
                duration_seconds: parsed.duration_seconds,
                transcript_text: parsed.transcript.unwrap_or_default(),
                share_url: parsed.share_url,
                raw,
            });
        }

        Ok(recordings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_raw_deserialization() {
        let json = r#"{
            "recordings": [
                {
                    "id": "rec-1",
                    "title": "Discovery Call",
                    "startedAt": "2026-02-17T15:02:00Z",
                    "durationSeconds": 1810,
                    "transcript": "hello there",
                    "shareUrl": "https://recorder.example/rec-1"
                },
                {
                    "id": "rec-2",
                    "startedAt": "2026-02-17T16:00:00Z"
                }
            ]
        }"#;

        let body: serde_json::Value = serde_json::from_str(json).expect("json");
        let items = body["recordings"].as_array().expect("array");

        let first: RecordingRaw = serde_json::from_value(items[0].clone()).expect("first");
        assert_eq!(first.id, "rec-1");
        assert_eq!(first.duration_seconds, Some(1810));
        assert_eq!(first.transcript.as_deref(), Some("hello there"));

        // Missing optional fields tolerated
        let second: RecordingRaw = serde_json::from_value(items[1].clone()).expect("second");
        assert_eq!(second.title, None);
        assert_eq!(second.transcript, None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = HttpTranscriptProvider::new("https://api.fireflies.ai/");
        assert_eq!(provider.base_url, "https://api.fireflies.ai");
    }
}
