use rusqlite::params;

use super::*;
use crate::util::utc_now;

impl CallDb {
    // =========================================================================
    // Audit log (append-only; rows are never updated or deleted)
    // =========================================================================

    /// Append one audit entry.
    pub fn insert_audit(&self, entry: &NewAuditEntry<'_>) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO audit_log (
                id, entity_type, entity_id, action, field_changed,
                old_value, new_value, trigger_source, trigger_detail,
                client_id, timestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                uuid::Uuid::new_v4().to_string(),
                entry.entity_type,
                entry.entity_id,
                entry.action,
                entry.field_changed,
                entry.old_value,
                entry.new_value,
                entry.trigger_source,
                entry.trigger_detail,
                entry.client_id,
                utc_now(),
            ],
        )?;
        Ok(())
    }

    /// All audit entries for one entity, oldest first.
    pub fn audit_entries_for(&self, entity_id: &str) -> Result<Vec<DbAuditEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, action, field_changed,
                    old_value, new_value, trigger_source, trigger_detail,
                    client_id, timestamp
             FROM audit_log
             WHERE entity_id = ?1
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![entity_id], |row| {
            Ok(DbAuditEntry {
                id: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                action: row.get(3)?,
                field_changed: row.get(4)?,
                old_value: row.get(5)?,
                new_value: row.get(6)?,
                trigger_source: row.get(7)?,
                trigger_detail: row.get(8)?,
                client_id: row.get(9)?,
                timestamp: row.get(10)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Number of audit entries for one entity.
    pub fn count_audit_entries(&self, entity_id: &str) -> Result<usize, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE entity_id = ?1",
            params![entity_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
