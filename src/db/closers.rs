use rusqlite::params;

use super::*;

impl CallDb {
    // =========================================================================
    // Closers
    // =========================================================================

    /// Insert or update a closer row.
    pub fn upsert_closer(&self, closer: &DbCloser) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO closers (
                closer_id, client_id, name, work_email,
                transcript_provider, provider_api_key, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(closer_id) DO UPDATE SET
                client_id = excluded.client_id,
                name = excluded.name,
                work_email = excluded.work_email,
                transcript_provider = excluded.transcript_provider,
                provider_api_key = excluded.provider_api_key,
                status = excluded.status",
            params![
                closer.closer_id,
                closer.client_id,
                closer.name,
                closer.work_email,
                closer.transcript_provider,
                closer.provider_api_key,
                closer.status,
            ],
        )?;
        Ok(())
    }

    /// Look up a closer by id.
    pub fn get_closer(&self, closer_id: &str) -> Result<Option<DbCloser>, DbError> {
        let sql = format!("SELECT {CLOSER_COLUMNS} FROM closers WHERE closer_id = ?1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![closer_id], map_closer_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Active closers holding a transcript provider credential — the set the
    /// polling fallback iterates. Optionally scoped to one client.
    pub fn credentialed_closers(
        &self,
        client_id: Option<&str>,
    ) -> Result<Vec<DbCloser>, DbError> {
        let base = format!(
            "SELECT {CLOSER_COLUMNS} FROM closers
             WHERE provider_api_key IS NOT NULL
               AND provider_api_key != ''
               AND status = 'active'"
        );
        match client_id {
            Some(cid) => {
                let sql = format!("{base} AND client_id = ?1 ORDER BY closer_id ASC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![cid], map_closer_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
            None => {
                let sql = format!("{base} ORDER BY closer_id ASC");
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], map_closer_row)?;
                rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
            }
        }
    }
}
