//! SQLite-backed record store for calls, prospects, closers, and the audit
//! trail.
//!
//! The database lives at `~/.calltrack/calltrack.db`. SQLite is the single
//! source of truth: calls are never physically deleted — cancellation and
//! loss are terminal *states*, so historical reporting survives calendar
//! cleanup.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

mod audit;
mod calls;
mod closers;
mod prospects;

#[cfg(test)]
pub(crate) mod testutil;

pub struct CallDb {
    conn: Connection,
}

impl CallDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction (`BEGIN IMMEDIATE`).
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::Sqlite)?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT").map_err(DbError::Sqlite)?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.calltrack/calltrack.db` and
    /// apply pending schema migrations.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database with the full schema. Test-only.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.calltrack/calltrack.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".calltrack").join("calltrack.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_at_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("calltrack.db");

        let db = CallDb::open_at(path.clone()).expect("open");
        assert!(path.exists());
        drop(db);

        // Re-open against the existing file — migrations must be a no-op
        CallDb::open_at(path).expect("re-open");
    }

    #[test]
    fn test_with_transaction_rolls_back_on_err() {
        let db = CallDb::open_in_memory().expect("open");

        let result: Result<(), DbError> = db.with_transaction(|db| {
            db.conn_ref()
                .execute(
                    "INSERT INTO closers (closer_id, client_id, name, work_email)
                     VALUES ('c1', 'client-1', 'Alex Morgan', 'alex@agency.io')",
                    [],
                )
                .map_err(DbError::Sqlite)?;
            Err(DbError::Migration("forced failure".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM closers", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0, "insert should have rolled back");
    }
}
