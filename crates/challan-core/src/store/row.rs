//! Flat row encoding used by the spreadsheet store.
//!
//! The spreadsheet is row/column oriented, so list fields travel as JSON
//! text inside a single cell and optional fields travel as `""` when unset.
//! A cell that fails to decode is replaced by an empty list and logged.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::StoreResult;
use crate::models::{HistoryEntry, SavedDc};

/// Fields stored as JSON text in one cell.
pub const JSON_CELL_FIELDS: [&str; 4] = ["items", "instruments", "boxNumbers", "history"];

/// Status-conditional fields, written as `""` when unset so updates clear the cell.
pub const OPTIONAL_FIELDS: [&str; 8] = [
    "returnedBy",
    "returnedAt",
    "returnedRemarks",
    "invoiceRef",
    "invoiceRemarks",
    "cashAt",
    "cashAmount",
    "cashRemarks",
];

/// Decode a JSON-in-cell list, falling back to an empty list.
pub fn decode_list_cell<T: DeserializeOwned>(field: &str, raw: &str) -> Vec<T> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(field, error = %e, "failed to decode list cell, using empty list");
            Vec::new()
        }
    }
}

/// Decode history entries one at a time, dropping any that don't decode.
pub fn decode_history_entries(entries: Vec<Value>) -> Vec<HistoryEntry> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<HistoryEntry>(entry.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(entry = %entry, error = %e, "dropping undecodable history entry");
                None
            }
        })
        .collect()
}

/// Decode a history cell, keeping every entry that decodes.
pub fn decode_history_cell(raw: &str) -> Vec<HistoryEntry> {
    decode_history_entries(decode_list_cell::<Value>("history", raw))
}

/// Encode a record as a flat spreadsheet row.
pub fn to_row(dc: &SavedDc) -> StoreResult<Map<String, Value>> {
    let mut row = match serde_json::to_value(dc)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    for field in JSON_CELL_FIELDS {
        let cell = row.remove(field).unwrap_or(Value::Array(Vec::new()));
        row.insert(field.to_string(), Value::String(serde_json::to_string(&cell)?));
    }
    for field in OPTIONAL_FIELDS {
        row.entry(field.to_string())
            .or_insert_with(|| Value::String(String::new()));
    }

    Ok(row)
}

/// Decode a flat spreadsheet row into a record.
///
/// Malformed list cells degrade to empty lists; a row missing its identity
/// or status is an error.
pub fn from_row(row: &Value) -> StoreResult<SavedDc> {
    let mut row = row.as_object().cloned().unwrap_or_default();

    for field in JSON_CELL_FIELDS {
        let decoded = match row.remove(field) {
            Some(Value::String(raw)) => Value::Array(decode_list_cell::<Value>(field, &raw)),
            Some(Value::Array(values)) => Value::Array(values),
            Some(Value::Null) | None => Value::Array(Vec::new()),
            Some(other) => {
                tracing::warn!(field, value = %other, "unexpected list cell, using empty list");
                Value::Array(Vec::new())
            }
        };
        row.insert(field.to_string(), decoded);
    }

    for field in OPTIONAL_FIELDS {
        let blank = matches!(row.get(field), Some(Value::String(s)) if s.trim().is_empty());
        if blank {
            row.remove(field);
        }
    }

    // Spreadsheet cells may hand numbers back as text
    if let Some(Value::String(amount)) = row.get("cashAmount").cloned() {
        match amount.trim().parse::<f64>() {
            Ok(parsed) => {
                row.insert("cashAmount".to_string(), Value::from(parsed));
            }
            Err(_) => {
                tracing::warn!(value = %amount, "unparseable cashAmount, dropping");
                row.remove("cashAmount");
            }
        }
    }

    for field in ["materialType", "receivedBy", "remarks"] {
        if matches!(row.get(field), Some(Value::Null)) {
            row.remove(field);
        }
    }

    // Sheets strip leading zeros and type numbers; identifiers are text
    for field in ["id", "dcNo"] {
        if let Some(Value::Number(n)) = row.get(field).cloned() {
            let text = n.to_string();
            row.insert(field.to_string(), Value::String(text));
        }
    }

    if let Some(Value::Array(entries)) = row.remove("history") {
        let kept = decode_history_entries(entries);
        row.insert("history".to_string(), serde_json::to_value(kept)?);
    }

    Ok(serde_json::from_value(Value::Object(row))?)
}
