//! Local key/value flags.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// Flag recording that the operator has logged in on this device.
pub const AUTHENTICATED_FLAG: &str = "authenticated";

impl Database {
    /// Set a flag, replacing any previous value.
    pub fn set_flag(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO local_flags (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_flag(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM local_flags WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Remove a flag. Returns false if it was not set.
    pub fn clear_flag(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_flags WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}
