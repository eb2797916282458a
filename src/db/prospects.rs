use rusqlite::params;

use super::*;
use crate::util::utc_now;

impl CallDb {
    // =========================================================================
    // Prospects
    // =========================================================================

    /// Make sure a prospect row exists for `(client_id, email)`, creating it
    /// with zero totals on first sighting. Payment totals and deal status
    /// are owned by the payment collaborator; this only touches identity
    /// fields and `last_seen`. The `"unknown"` sentinel never gets a row.
    pub fn ensure_prospect(
        &self,
        client_id: &str,
        prospect_email: &str,
        prospect_name: Option<&str>,
    ) -> Result<(), DbError> {
        if prospect_email.is_empty() || prospect_email.eq_ignore_ascii_case("unknown") {
            return Ok(());
        }

        let now = utc_now();
        self.conn.execute(
            "INSERT INTO prospects (
                prospect_id, client_id, prospect_email, prospect_name,
                deal_status, total_cash_collected, total_revenue,
                first_seen, last_seen
             ) VALUES (?1, ?2, ?3, ?4, 'open', 0, 0, ?5, ?5)
             ON CONFLICT(client_id, prospect_email) DO UPDATE SET
                prospect_name = COALESCE(excluded.prospect_name, prospects.prospect_name),
                last_seen = excluded.last_seen",
            params![
                uuid::Uuid::new_v4().to_string(),
                client_id,
                prospect_email.to_lowercase(),
                prospect_name,
                now,
            ],
        )?;
        Ok(())
    }

    /// Look up a prospect by `(client_id, email)`.
    pub fn get_prospect(
        &self,
        client_id: &str,
        prospect_email: &str,
    ) -> Result<Option<DbProspect>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT prospect_id, client_id, prospect_email, prospect_name,
                    deal_status, total_cash_collected, total_revenue,
                    first_seen, last_seen
             FROM prospects
             WHERE client_id = ?1 AND prospect_email = ?2 COLLATE NOCASE",
        )?;
        let mut rows = stmt.query_map(params![client_id, prospect_email], |row| {
            Ok(DbProspect {
                prospect_id: row.get(0)?,
                client_id: row.get(1)?,
                prospect_email: row.get(2)?,
                prospect_name: row.get(3)?,
                deal_status: row.get(4)?,
                total_cash_collected: row.get(5)?,
                total_revenue: row.get(6)?,
                first_seen: row.get(7)?,
                last_seen: row.get(8)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}
