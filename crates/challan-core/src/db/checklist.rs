//! Packing checklist database operations.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::PackingEntry;

impl Database {
    /// Mark an entity of a procedure packed or unpacked.
    pub fn set_packed(
        &self,
        procedure_name: &str,
        entity_key: &str,
        packed: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let packed_at = packed.then(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));
        self.conn.execute(
            r#"
            INSERT INTO packing_checklist (procedure_name, entity_key, packed, packed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(procedure_name, entity_key) DO UPDATE SET
                packed = excluded.packed,
                packed_at = excluded.packed_at
            "#,
            params![procedure_name, entity_key, packed, packed_at],
        )?;
        Ok(())
    }

    /// Checklist state of one entity.
    pub fn packing_entry(
        &self,
        procedure_name: &str,
        entity_key: &str,
    ) -> DbResult<Option<PackingEntry>> {
        self.conn
            .query_row(
                r#"
                SELECT procedure_name, entity_key, packed, packed_at
                FROM packing_checklist
                WHERE procedure_name = ?1 AND entity_key = ?2
                "#,
                params![procedure_name, entity_key],
                |row| {
                    Ok(PackingRow {
                        procedure_name: row.get(0)?,
                        entity_key: row.get(1)?,
                        packed: row.get(2)?,
                        packed_at: row.get(3)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// All checklist entries of a procedure.
    pub fn list_packing(&self, procedure_name: &str) -> DbResult<Vec<PackingEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT procedure_name, entity_key, packed, packed_at
            FROM packing_checklist
            WHERE procedure_name = ?
            ORDER BY entity_key
            "#,
        )?;

        let rows = stmt.query_map([procedure_name], |row| {
            Ok(PackingRow {
                procedure_name: row.get(0)?,
                entity_key: row.get(1)?,
                packed: row.get(2)?,
                packed_at: row.get(3)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Reset the checklist of a procedure. Returns the number of entries removed.
    pub fn clear_packing(&self, procedure_name: &str) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "DELETE FROM packing_checklist WHERE procedure_name = ?",
            [procedure_name],
        )?;
        Ok(rows_affected)
    }
}

/// Intermediate row struct for database mapping.
struct PackingRow {
    procedure_name: String,
    entity_key: String,
    packed: bool,
    packed_at: Option<String>,
}

impl TryFrom<PackingRow> for PackingEntry {
    type Error = DbError;

    fn try_from(row: PackingRow) -> Result<Self, Self::Error> {
        let packed_at = row
            .packed_at
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|e| DbError::Constraint(format!("Invalid packed_at {:?}: {}", raw, e)))
            })
            .transpose()?;

        Ok(PackingEntry {
            procedure_name: row.procedure_name,
            entity_key: row.entity_key,
            packed: row.packed,
            packed_at,
        })
    }
}
