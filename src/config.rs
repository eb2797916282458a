//! Runtime configuration.
//!
//! Lives at `~/.calltrack/config.json` (serde camelCase). Sweep-related
//! values are hot-reloadable: the sweeper re-reads the file on every
//! invocation rather than caching at startup, so an operator can shorten
//! the ghost timeout without a restart.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Phase 2 cutoff: minutes past the meeting window before a waiting
    /// call is declared ghosted.
    pub transcript_timeout_minutes: i64,
    /// Sweep period in minutes.
    pub ghost_check_interval_minutes: u64,
    /// How far back Phase 1.5 asks the transcript provider for recordings.
    pub transcript_lookback_hours: i64,
    /// Base URL for the transcript provider API.
    pub transcript_provider_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            transcript_timeout_minutes: 120,
            ghost_check_interval_minutes: 15,
            transcript_lookback_hours: 24,
            transcript_provider_base_url: "https://api.fireflies.ai".to_string(),
        }
    }
}

/// The canonical config file path (`~/.calltrack/config.json`).
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".calltrack").join("config.json"))
}

/// Load configuration from a path. A missing file yields defaults — the
/// service runs unconfigured; a present-but-unparseable file is an error so
/// typos don't silently fall back.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Load configuration from the canonical path.
pub fn load_config() -> Result<Config, String> {
    load_config_from(&config_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_config_from(&dir.path().join("config.json")).expect("load");
        assert_eq!(cfg.transcript_timeout_minutes, 120);
        assert_eq!(cfg.ghost_check_interval_minutes, 15);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "transcriptTimeoutMinutes": 45 }"#).expect("write");

        let cfg = load_config_from(&path).expect("load");
        assert_eq!(cfg.transcript_timeout_minutes, 45);
        assert_eq!(cfg.transcript_lookback_hours, 24);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(load_config_from(&path).is_err());
    }
}
