//! Delivery challan models: drafts, saved records and their audit history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::procedure::{qty_or_default, ActiveProcedure, SizeQty};

/// Procedure label recorded on free-form line items.
pub const MANUAL_PROCEDURE: &str = "Manual";

/// Lifecycle status of a saved DC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DcStatus {
    /// Shipped, awaiting return of unused material
    Pending,
    /// Material returned, awaiting invoice or cash settlement
    Returned,
    /// Settled in cash, awaiting invoice
    Cash,
    /// Invoiced
    Completed,
}

impl DcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DcStatus::Pending => "pending",
            DcStatus::Returned => "returned",
            DcStatus::Cash => "cash",
            DcStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DcStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(DcStatus::Pending),
            "returned" => Ok(DcStatus::Returned),
            "cash" => Ok(DcStatus::Cash),
            "completed" => Ok(DcStatus::Completed),
            other => Err(format!("Unknown DC status: {}", other)),
        }
    }
}

/// Action recorded in a history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    MarkReturned,
    LinkInvoice,
    MoveCashToCompleted,
    MoveToCash,
    MoveBackToPending,
    MoveBackToReturned,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "CREATED",
            HistoryAction::MarkReturned => "MARK_RETURNED",
            HistoryAction::LinkInvoice => "LINK_INVOICE",
            HistoryAction::MoveCashToCompleted => "MOVE_CASH_TO_COMPLETED",
            HistoryAction::MoveToCash => "MOVE_TO_CASH",
            HistoryAction::MoveBackToPending => "MOVE_BACK_TO_PENDING",
            HistoryAction::MoveBackToReturned => "MOVE_BACK_TO_RETURNED",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of status-conditional fields taken right before they were cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClearedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_remarks: Option<String>,
}

impl ClearedFields {
    pub fn is_empty(&self) -> bool {
        *self == ClearedFields::default()
    }
}

/// Extra detail attached to a history entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared: Option<ClearedFields>,
}

/// One immutable, appended record of a status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub action: HistoryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<DcStatus>,
    pub to_status: DcStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<HistoryMeta>,
}

/// A normalized line item on a DC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DcItem {
    pub name: String,
    pub sizes: Vec<SizeQty>,
    /// Originating procedure name (or `"Manual"`)
    pub procedure: String,
    pub is_selectable: bool,
}

/// Everything needed to create a saved DC, produced by [`ChallanDraft::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDc {
    pub hospital_name: String,
    pub dc_no: String,
    pub material_type: String,
    pub received_by: String,
    pub remarks: String,
    pub items: Vec<DcItem>,
    pub instruments: Vec<String>,
    pub box_numbers: Vec<String>,
}

/// A persisted delivery challan tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedDc {
    /// Unique ID, generated at creation
    pub id: String,
    pub hospital_name: String,
    pub dc_no: String,
    #[serde(default)]
    pub material_type: String,
    #[serde(default)]
    pub received_by: String,
    #[serde(default)]
    pub remarks: String,
    /// Creation timestamp
    pub saved_at: DateTime<Utc>,
    pub status: DcStatus,
    #[serde(default)]
    pub items: Vec<DcItem>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub box_numbers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_remarks: Option<String>,

    /// Append-only audit trail
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl SavedDc {
    /// Create a pending record with its `CREATED` history entry.
    pub fn create(new_dc: NewDc, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            hospital_name: new_dc.hospital_name,
            dc_no: new_dc.dc_no,
            material_type: new_dc.material_type,
            received_by: new_dc.received_by,
            remarks: new_dc.remarks,
            saved_at: now,
            status: DcStatus::Pending,
            items: new_dc.items,
            instruments: new_dc.instruments,
            box_numbers: new_dc.box_numbers,
            returned_by: None,
            returned_at: None,
            returned_remarks: None,
            invoice_ref: None,
            invoice_remarks: None,
            cash_at: None,
            cash_amount: None,
            cash_remarks: None,
            history: vec![HistoryEntry {
                at: now,
                action: HistoryAction::Created,
                from_status: None,
                to_status: DcStatus::Pending,
                meta: None,
            }],
        }
    }

    /// The most recent history entry.
    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// The action that last moved this record into `completed`, if any.
    pub fn last_completion(&self) -> Option<HistoryAction> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.to_status == DcStatus::Completed)
            .map(|entry| entry.action)
    }

    /// Total quantity across all sizes of all items. Non-numeric quantities count as zero.
    pub fn total_quantity(&self) -> u64 {
        self.items
            .iter()
            .flat_map(|item| item.sizes.iter())
            .filter_map(|s| s.qty.trim().parse::<u64>().ok())
            .sum()
    }
}

/// Why a draft cannot be saved.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DraftError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Draft has no items or instruments")]
    Empty,
}

/// The working DC before save.
#[derive(Debug, Clone, Default)]
pub struct ChallanDraft {
    pub hospital_name: String,
    pub dc_no: String,
    pub material_type: String,
    pub received_by: String,
    pub remarks: String,
    pub procedures: Vec<ActiveProcedure>,
    pub manual_items: Vec<DcItem>,
    pub manual_instruments: Vec<String>,
    pub box_numbers: Vec<String>,
}

impl ChallanDraft {
    pub fn new(hospital_name: impl Into<String>, dc_no: impl Into<String>) -> Self {
        Self {
            hospital_name: hospital_name.into(),
            dc_no: dc_no.into(),
            ..Default::default()
        }
    }

    /// Add a procedure to the working DC. Returns false if it is already present.
    pub fn add_procedure(&mut self, procedure: ActiveProcedure) -> bool {
        if self.procedures.iter().any(|p| p.name() == procedure.name()) {
            return false;
        }
        self.procedures.push(procedure);
        true
    }

    pub fn remove_procedure(&mut self, name: &str) {
        self.procedures.retain(|p| p.name() != name);
    }

    pub fn procedure_mut(&mut self, name: &str) -> Option<&mut ActiveProcedure> {
        self.procedures.iter_mut().find(|p| p.name() == name)
    }

    /// Add a free-form item not tied to any catalog procedure.
    pub fn add_manual_item(&mut self, name: &str, sizes: Vec<SizeQty>) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let mut sizes: Vec<SizeQty> = sizes
            .into_iter()
            .map(|s| SizeQty::new(s.size.trim(), qty_or_default(&s.qty)))
            .collect();
        if sizes.is_empty() {
            sizes.push(SizeQty::new("", qty_or_default("")));
        }
        self.manual_items.push(DcItem {
            name: name.to_string(),
            sizes,
            procedure: MANUAL_PROCEDURE.to_string(),
            is_selectable: false,
        });
    }

    pub fn add_manual_instrument(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.manual_instruments.push(name.to_string());
        }
    }

    /// Normalize the draft into a record ready to save.
    pub fn build(&self) -> Result<NewDc, DraftError> {
        if self.hospital_name.trim().is_empty() {
            return Err(DraftError::MissingField("hospitalName"));
        }
        if self.dc_no.trim().is_empty() {
            return Err(DraftError::MissingField("dcNo"));
        }

        let mut items: Vec<DcItem> = self
            .procedures
            .iter()
            .flat_map(|p| p.to_dc_items())
            .collect();
        items.extend(self.manual_items.iter().cloned());

        let instruments = dedup_preserving_order(
            self.procedures
                .iter()
                .flat_map(|p| p.procedure.instruments.iter())
                .chain(self.manual_instruments.iter()),
        );

        let box_numbers = dedup_preserving_order(
            self.procedures
                .iter()
                .flat_map(|p| p.box_numbers().iter())
                .chain(self.box_numbers.iter()),
        );

        if items.is_empty() && instruments.is_empty() {
            return Err(DraftError::Empty);
        }

        Ok(NewDc {
            hospital_name: self.hospital_name.trim().to_string(),
            dc_no: self.dc_no.trim().to_string(),
            material_type: self.material_type.trim().to_string(),
            received_by: self.received_by.trim().to_string(),
            remarks: self.remarks.trim().to_string(),
            items,
            instruments,
            box_numbers,
        })
    }
}

fn dedup_preserving_order<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(|v| v.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FixedItem, Procedure};

    fn make_procedure(name: &str, instruments: &[&str]) -> Procedure {
        let mut procedure = Procedure::new(name);
        procedure.fixed_items = vec![FixedItem {
            name: format!("{} Rod", name),
            qty: "1".into(),
        }];
        procedure.instruments = instruments.iter().map(|s| s.to_string()).collect();
        procedure
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            DcStatus::Pending,
            DcStatus::Returned,
            DcStatus::Cash,
            DcStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<DcStatus>().unwrap(), status);
        }
        assert!("archived".parse::<DcStatus>().is_err());
    }

    #[test]
    fn test_create_saved_dc() {
        let now = Utc::now();
        let dc = SavedDc::create(
            NewDc {
                hospital_name: "City Hospital".into(),
                dc_no: "DC-001".into(),
                ..Default::default()
            },
            "dc-1".into(),
            now,
        );

        assert_eq!(dc.status, DcStatus::Pending);
        assert_eq!(dc.history.len(), 1);
        assert_eq!(dc.history[0].action, HistoryAction::Created);
        assert_eq!(dc.history[0].from_status, None);
        assert_eq!(dc.history[0].to_status, DcStatus::Pending);
        assert_eq!(dc.saved_at, now);
    }

    #[test]
    fn test_wire_names() {
        let dc = SavedDc::create(
            NewDc {
                hospital_name: "City Hospital".into(),
                dc_no: "DC-001".into(),
                ..Default::default()
            },
            "dc-1".into(),
            Utc::now(),
        );
        let json = serde_json::to_value(&dc).unwrap();

        assert_eq!(json["hospitalName"], "City Hospital");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["history"][0]["action"], "CREATED");
        assert_eq!(json["history"][0]["toStatus"], "pending");
        assert!(json["history"][0].get("fromStatus").is_none());
        assert!(json.get("returnedBy").is_none());
    }

    #[test]
    fn test_build_requires_header_fields() {
        let draft = ChallanDraft::new("", "DC-1");
        assert_eq!(draft.build(), Err(DraftError::MissingField("hospitalName")));

        let draft = ChallanDraft::new("City Hospital", " ");
        assert_eq!(draft.build(), Err(DraftError::MissingField("dcNo")));

        let draft = ChallanDraft::new("City Hospital", "DC-1");
        assert_eq!(draft.build(), Err(DraftError::Empty));
    }

    #[test]
    fn test_build_dedupes_instruments() {
        let mut draft = ChallanDraft::new("City Hospital", "DC-1");
        draft.add_procedure(ActiveProcedure::new(make_procedure("Hip", &["Drill", "Hammer"])));
        draft.add_procedure(ActiveProcedure::new(make_procedure("Knee", &["Hammer", "Saw"])));
        draft.add_manual_instrument("Drill");

        let new_dc = draft.build().unwrap();
        assert_eq!(new_dc.instruments, vec!["Drill", "Hammer", "Saw"]);
        assert_eq!(new_dc.items.len(), 2);
    }

    #[test]
    fn test_add_procedure_twice_rejected() {
        let mut draft = ChallanDraft::new("City Hospital", "DC-1");
        assert!(draft.add_procedure(ActiveProcedure::new(make_procedure("Hip", &[]))));
        assert!(!draft.add_procedure(ActiveProcedure::new(make_procedure("Hip", &[]))));

        draft.remove_procedure("Hip");
        assert!(draft.procedures.is_empty());
    }

    #[test]
    fn test_manual_items() {
        let mut draft = ChallanDraft::new("City Hospital", "DC-1");
        draft.add_manual_item("Bone Cement", vec![]);
        draft.add_manual_item("  ", vec![]);

        let new_dc = draft.build().unwrap();
        assert_eq!(new_dc.items.len(), 1);
        assert_eq!(new_dc.items[0].procedure, MANUAL_PROCEDURE);
        assert_eq!(new_dc.items[0].sizes, vec![SizeQty::new("", "1")]);
    }

    #[test]
    fn test_total_quantity() {
        let mut dc = SavedDc::create(NewDc::default(), "dc-1".into(), Utc::now());
        dc.items = vec![DcItem {
            name: "Screw".into(),
            sizes: vec![SizeQty::new("6mm", "2"), SizeQty::new("8mm", "x")],
            procedure: "Hip".into(),
            is_selectable: true,
        }];
        assert_eq!(dc.total_quantity(), 2);
    }
}
