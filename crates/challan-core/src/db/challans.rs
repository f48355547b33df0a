//! Saved DC database operations.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{DcStatus, SavedDc};
use crate::store::{decode_history_cell, decode_list_cell, DcStore, StoreResult};

const SELECT_COLUMNS: &str = r#"
    SELECT id, hospital_name, dc_no, material_type, received_by, remarks,
           saved_at, status, items, instruments, box_numbers,
           returned_by, returned_at, returned_remarks,
           invoice_ref, invoice_remarks,
           cash_at, cash_amount, cash_remarks, history
    FROM saved_dcs
"#;

impl Database {
    /// Insert a new saved DC.
    pub fn insert_dc(&self, dc: &SavedDc) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO saved_dcs (
                id, hospital_name, dc_no, material_type, received_by, remarks,
                saved_at, status, items, instruments, box_numbers,
                returned_by, returned_at, returned_remarks,
                invoice_ref, invoice_remarks,
                cash_at, cash_amount, cash_remarks, history
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
            params![
                dc.id,
                dc.hospital_name,
                dc.dc_no,
                dc.material_type,
                dc.received_by,
                dc.remarks,
                format_timestamp(&dc.saved_at),
                dc.status.as_str(),
                serde_json::to_string(&dc.items)?,
                serde_json::to_string(&dc.instruments)?,
                serde_json::to_string(&dc.box_numbers)?,
                dc.returned_by,
                dc.returned_at.as_ref().map(format_timestamp),
                dc.returned_remarks,
                dc.invoice_ref,
                dc.invoice_remarks,
                dc.cash_at.as_ref().map(format_timestamp),
                dc.cash_amount,
                dc.cash_remarks,
                serde_json::to_string(&dc.history)?,
            ],
        )?;
        Ok(())
    }

    /// Replace an existing saved DC. Returns false if no record has its ID.
    pub fn update_dc(&self, dc: &SavedDc) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE saved_dcs SET
                hospital_name = ?2,
                dc_no = ?3,
                material_type = ?4,
                received_by = ?5,
                remarks = ?6,
                saved_at = ?7,
                status = ?8,
                items = ?9,
                instruments = ?10,
                box_numbers = ?11,
                returned_by = ?12,
                returned_at = ?13,
                returned_remarks = ?14,
                invoice_ref = ?15,
                invoice_remarks = ?16,
                cash_at = ?17,
                cash_amount = ?18,
                cash_remarks = ?19,
                history = ?20
            WHERE id = ?1
            "#,
            params![
                dc.id,
                dc.hospital_name,
                dc.dc_no,
                dc.material_type,
                dc.received_by,
                dc.remarks,
                format_timestamp(&dc.saved_at),
                dc.status.as_str(),
                serde_json::to_string(&dc.items)?,
                serde_json::to_string(&dc.instruments)?,
                serde_json::to_string(&dc.box_numbers)?,
                dc.returned_by,
                dc.returned_at.as_ref().map(format_timestamp),
                dc.returned_remarks,
                dc.invoice_ref,
                dc.invoice_remarks,
                dc.cash_at.as_ref().map(format_timestamp),
                dc.cash_amount,
                dc.cash_remarks,
                serde_json::to_string(&dc.history)?,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a saved DC by ID.
    pub fn get_dc(&self, id: &str) -> DbResult<Option<SavedDc>> {
        self.conn
            .query_row(&format!("{} WHERE id = ?", SELECT_COLUMNS), [id], read_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all saved DCs, newest first.
    pub fn list_dcs(&self) -> DbResult<Vec<SavedDc>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY saved_at DESC", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], read_row)?;

        let mut dcs = Vec::new();
        for row in rows {
            dcs.push(row?.try_into()?);
        }
        Ok(dcs)
    }

    /// List saved DCs in one status, newest first.
    pub fn list_dcs_by_status(&self, status: DcStatus) -> DbResult<Vec<SavedDc>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE status = ? ORDER BY saved_at DESC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map([status.as_str()], read_row)?;

        let mut dcs = Vec::new();
        for row in rows {
            dcs.push(row?.try_into()?);
        }
        Ok(dcs)
    }

    /// Count saved DCs.
    pub fn count_dcs(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM saved_dcs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete a saved DC.
    pub fn delete_dc(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM saved_dcs WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

impl DcStore for Database {
    fn list_all(&self) -> StoreResult<Vec<SavedDc>> {
        Ok(self.list_dcs()?)
    }

    fn get(&self, id: &str) -> StoreResult<Option<SavedDc>> {
        Ok(self.get_dc(id)?)
    }

    fn append(&self, dc: &SavedDc) -> StoreResult<()> {
        Ok(self.insert_dc(dc)?)
    }

    fn update(&self, dc: &SavedDc) -> StoreResult<bool> {
        Ok(self.update_dc(dc)?)
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.delete_dc(id)?)
    }
}

/// Intermediate row struct for database mapping.
struct DcRow {
    id: String,
    hospital_name: String,
    dc_no: String,
    material_type: String,
    received_by: String,
    remarks: String,
    saved_at: String,
    status: String,
    items: String,
    instruments: String,
    box_numbers: String,
    returned_by: Option<String>,
    returned_at: Option<String>,
    returned_remarks: Option<String>,
    invoice_ref: Option<String>,
    invoice_remarks: Option<String>,
    cash_at: Option<String>,
    cash_amount: Option<f64>,
    cash_remarks: Option<String>,
    history: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<DcRow> {
    Ok(DcRow {
        id: row.get(0)?,
        hospital_name: row.get(1)?,
        dc_no: row.get(2)?,
        material_type: row.get(3)?,
        received_by: row.get(4)?,
        remarks: row.get(5)?,
        saved_at: row.get(6)?,
        status: row.get(7)?,
        items: row.get(8)?,
        instruments: row.get(9)?,
        box_numbers: row.get(10)?,
        returned_by: row.get(11)?,
        returned_at: row.get(12)?,
        returned_remarks: row.get(13)?,
        invoice_ref: row.get(14)?,
        invoice_remarks: row.get(15)?,
        cash_at: row.get(16)?,
        cash_amount: row.get(17)?,
        cash_remarks: row.get(18)?,
        history: row.get(19)?,
    })
}

impl TryFrom<DcRow> for SavedDc {
    type Error = DbError;

    fn try_from(row: DcRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<DcStatus>()
            .map_err(DbError::Constraint)?;

        Ok(SavedDc {
            items: decode_list_cell("items", &row.items),
            instruments: decode_list_cell("instruments", &row.instruments),
            box_numbers: decode_list_cell("boxNumbers", &row.box_numbers),
            history: decode_history_cell(&row.history),
            saved_at: parse_timestamp(&row.saved_at)?,
            returned_at: row.returned_at.as_deref().map(parse_timestamp).transpose()?,
            cash_at: row.cash_at.as_deref().map(parse_timestamp).transpose()?,
            id: row.id,
            hospital_name: row.hospital_name,
            dc_no: row.dc_no,
            material_type: row.material_type,
            received_by: row.received_by,
            remarks: row.remarks,
            status,
            returned_by: row.returned_by,
            returned_remarks: row.returned_remarks,
            invoice_ref: row.invoice_ref,
            invoice_remarks: row.invoice_remarks,
            cash_amount: row.cash_amount,
            cash_remarks: row.cash_remarks,
        })
    }
}

// Fixed-width nanoseconds keep text ordering chronological and match history JSON
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Invalid timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DcItem, NewDc, SizeQty};
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn make_dc(id: &str, hour: u32) -> SavedDc {
        SavedDc::create(
            NewDc {
                hospital_name: "City Hospital".into(),
                dc_no: format!("DC-{}", id),
                items: vec![DcItem {
                    name: "Screw".into(),
                    sizes: vec![SizeQty::new("6mm", "2")],
                    procedure: "Hip Replacement".into(),
                    is_selectable: true,
                }],
                instruments: vec!["Drill".into()],
                ..Default::default()
            },
            id.into(),
            at(hour),
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let dc = make_dc("dc-1", 9);
        db.insert_dc(&dc).unwrap();

        let retrieved = db.get_dc("dc-1").unwrap().unwrap();
        assert_eq!(retrieved, dc);
        assert!(db.get_dc("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        let dc = make_dc("dc-1", 9);
        db.insert_dc(&dc).unwrap();
        assert!(matches!(db.insert_dc(&dc), Err(DbError::Sqlite(_))));
    }

    #[test]
    fn test_update_replaces_record() {
        let db = Database::open_in_memory().unwrap();
        let mut dc = make_dc("dc-1", 9);
        db.insert_dc(&dc).unwrap();

        dc.status = DcStatus::Cash;
        dc.cash_at = Some(at(9) + Duration::hours(2));
        dc.cash_amount = Some(1500.5);
        assert!(db.update_dc(&dc).unwrap());

        let retrieved = db.get_dc("dc-1").unwrap().unwrap();
        assert_eq!(retrieved.status, DcStatus::Cash);
        assert_eq!(retrieved.cash_amount, Some(1500.5));
        assert_eq!(retrieved.cash_at, dc.cash_at);

        assert!(!db.update_dc(&make_dc("missing", 9)).unwrap());
    }

    #[test]
    fn test_list_newest_first_and_by_status() {
        let db = Database::open_in_memory().unwrap();
        db.insert_dc(&make_dc("early", 8)).unwrap();
        db.insert_dc(&make_dc("late", 17)).unwrap();

        let mut returned = make_dc("mid", 12);
        returned.status = DcStatus::Returned;
        db.insert_dc(&returned).unwrap();

        let ids: Vec<String> = db.list_dcs().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["late", "mid", "early"]);

        let pending = db.list_dcs_by_status(DcStatus::Pending).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(db.list_dcs_by_status(DcStatus::Returned).unwrap()[0].id, "mid");
        assert_eq!(db.count_dcs().unwrap(), 3);
    }

    #[test]
    fn test_delete() {
        let db = Database::open_in_memory().unwrap();
        db.insert_dc(&make_dc("dc-1", 9)).unwrap();

        assert!(db.delete_dc("dc-1").unwrap());
        assert!(!db.delete_dc("dc-1").unwrap());
        assert_eq!(db.count_dcs().unwrap(), 0);
    }

    #[test]
    fn test_malformed_list_cell_becomes_empty() {
        let db = Database::open_in_memory().unwrap();
        db.insert_dc(&make_dc("dc-1", 9)).unwrap();
        db.conn()
            .execute("UPDATE saved_dcs SET items = '[{oops' WHERE id = 'dc-1'", [])
            .unwrap();

        let retrieved = db.get_dc("dc-1").unwrap().unwrap();
        assert!(retrieved.items.is_empty());
        assert_eq!(retrieved.instruments, vec!["Drill"]);
    }

    #[test]
    fn test_sub_millisecond_timestamps_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let saved_at = at(10) + Duration::nanoseconds(123_456_789);
        let mut dc = SavedDc::create(NewDc::default(), "dc-1".into(), saved_at);
        db.insert_dc(&dc).unwrap();

        let stored = db.get_dc("dc-1").unwrap().unwrap();
        assert_eq!(stored, dc);
        assert_eq!(stored.saved_at, stored.history[0].at);

        dc.status = DcStatus::Returned;
        dc.returned_at = Some(saved_at + Duration::nanoseconds(1));
        db.update_dc(&dc).unwrap();
        assert_eq!(db.get_dc("dc-1").unwrap().unwrap(), dc);
    }

    #[test]
    fn test_bad_history_entry_keeps_the_rest() {
        let db = Database::open_in_memory().unwrap();
        let dc = make_dc("dc-1", 9);
        db.insert_dc(&dc).unwrap();

        let created = serde_json::to_string(&dc.history[0]).unwrap();
        db.conn()
            .execute(
                "UPDATE saved_dcs SET history = ?1 WHERE id = 'dc-1'",
                [format!("[{}, {{\"action\": 7}}]", created)],
            )
            .unwrap();

        let retrieved = db.get_dc("dc-1").unwrap().unwrap();
        assert_eq!(retrieved.history, dc.history);
    }

    #[test]
    fn test_store_trait() {
        let db = Database::open_in_memory().unwrap();
        let store: &dyn DcStore = &db;

        store.append(&make_dc("dc-1", 9)).unwrap();
        assert_eq!(store.list_all().unwrap().len(), 1);
        assert!(store.get("dc-1").unwrap().is_some());
        assert!(store.delete("dc-1").unwrap());
        assert!(!store.delete("dc-1").unwrap());
    }
}
