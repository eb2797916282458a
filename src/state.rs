//! Shared application state.
//!
//! One `AppState` is constructed at process start and passed by `Arc` to
//! the ingestion path and the sweeper — no module-level mutable state. The
//! config path is an instance field so tests run fully isolated from the
//! operator's home directory.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::{self, Config};
use crate::db::{CallDb, DbError};

pub struct AppState {
    pub config: Mutex<Config>,
    pub db: Mutex<Option<CallDb>>,
    /// Where to re-read config from on each sweep; `None` disables disk
    /// reloads (tests, embedded use).
    config_path: Option<PathBuf>,
}

impl AppState {
    /// Production constructor: canonical config path, database at
    /// `~/.calltrack/calltrack.db`. A failed DB open disables store-backed
    /// features rather than aborting startup.
    pub fn new() -> Self {
        let config_path = config::config_path().ok();
        let config = config::load_config().unwrap_or_else(|e| {
            log::warn!("Config unreadable ({}), using defaults", e);
            Config::default()
        });

        let db = match CallDb::open() {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open call database: {e}. Store features disabled.");
                None
            }
        };

        Self {
            config: Mutex::new(config),
            db: Mutex::new(db),
            config_path,
        }
    }

    /// Construct around an existing database and fixed config. No disk
    /// config reloads.
    pub fn with_db(db: CallDb, config: Config) -> Self {
        Self {
            config: Mutex::new(config),
            db: Mutex::new(Some(db)),
            config_path: None,
        }
    }

    /// Current configuration, re-read from disk when a config path is set.
    ///
    /// Called at every sweep invocation so timeout and interval changes
    /// apply without a restart. Falls back to the last good value when the
    /// file is unreadable.
    pub fn fresh_config(&self) -> Config {
        if let Some(ref path) = self.config_path {
            match config::load_config_from(path) {
                Ok(cfg) => {
                    if let Ok(mut guard) = self.config.lock() {
                        *guard = cfg.clone();
                    }
                    return cfg;
                }
                Err(e) => {
                    log::warn!("Config reload failed ({}), keeping previous values", e);
                }
            }
        }
        self.config
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Run a closure against the database.
    pub fn with_db_ref<T>(
        &self,
        f: impl FnOnce(&CallDb) -> Result<T, DbError>,
    ) -> Result<T, String> {
        let guard = self.db.lock().map_err(|_| "Lock poisoned".to_string())?;
        let db = guard.as_ref().ok_or("Database not initialized")?;
        f(db).map_err(|e| e.to_string())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
