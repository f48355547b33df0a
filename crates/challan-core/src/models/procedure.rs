//! Procedure catalog models.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::challan::DcItem;

/// Category used when the catalog row leaves the type column blank.
pub const DEFAULT_PROCEDURE_TYPE: &str = "General";

/// Quantity used whenever a catalog or user entry leaves it blank.
pub const DEFAULT_QTY: &str = "1";

/// A single (size, quantity) variant of an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SizeQty {
    pub size: String,
    pub qty: String,
}

impl SizeQty {
    pub fn new(size: impl Into<String>, qty: impl Into<String>) -> Self {
        Self {
            size: size.into(),
            qty: qty.into(),
        }
    }
}

/// An item the user must opt into, optionally with size variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectableItem {
    /// Encoding as it appeared in the catalog (e.g. `"Screw {6mm:2}"`)
    pub raw: String,
    /// Base name with the `{...}` suffix stripped
    pub name: String,
    /// Size/quantity variants offered by the catalog
    pub sizes: Vec<SizeQty>,
}

/// An item included by default with an editable quantity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedItem {
    pub name: String,
    pub qty: String,
}

/// Physical storage location of an item or instrument.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemLocation {
    pub room: String,
    pub rack: String,
    #[serde(rename = "box")]
    pub box_no: String,
}

/// Which per-entity lookup table a name belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Instrument,
    FixedItem,
    Item,
}

/// A catalog entry bundling items and instruments for one surgery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    /// Unique key within a catalog snapshot
    pub name: String,
    /// Category label
    #[serde(rename = "type")]
    pub procedure_type: String,
    pub items: Vec<SelectableItem>,
    pub fixed_items: Vec<FixedItem>,
    pub instruments: Vec<String>,
    pub instrument_images: HashMap<String, Option<String>>,
    pub fixed_item_images: HashMap<String, Option<String>>,
    /// Keyed by selectable item base name
    pub item_images: HashMap<String, Option<String>>,
    pub instrument_locations: HashMap<String, Option<ItemLocation>>,
    pub fixed_item_locations: HashMap<String, Option<ItemLocation>>,
    /// Keyed by selectable item base name
    pub item_locations: HashMap<String, Option<ItemLocation>>,
}

impl Procedure {
    /// Create an empty procedure in the default category.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            procedure_type: DEFAULT_PROCEDURE_TYPE.to_string(),
            items: Vec::new(),
            fixed_items: Vec::new(),
            instruments: Vec::new(),
            instrument_images: HashMap::new(),
            fixed_item_images: HashMap::new(),
            item_images: HashMap::new(),
            instrument_locations: HashMap::new(),
            fixed_item_locations: HashMap::new(),
            item_locations: HashMap::new(),
        }
    }

    /// Find a selectable item by base name.
    pub fn selectable_item(&self, name: &str) -> Option<&SelectableItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Find a fixed item by name.
    pub fn fixed_item(&self, name: &str) -> Option<&FixedItem> {
        self.fixed_items.iter().find(|item| item.name == name)
    }

    /// Image URL for an entity, if the catalog supplied one.
    pub fn image(&self, kind: EntityKind, name: &str) -> Option<&str> {
        let map = match kind {
            EntityKind::Instrument => &self.instrument_images,
            EntityKind::FixedItem => &self.fixed_item_images,
            EntityKind::Item => &self.item_images,
        };
        map.get(name).and_then(|url| url.as_deref())
    }

    /// Storage location for an entity, if the catalog supplied a full triple.
    pub fn location(&self, kind: EntityKind, name: &str) -> Option<&ItemLocation> {
        let map = match kind {
            EntityKind::Instrument => &self.instrument_locations,
            EntityKind::FixedItem => &self.fixed_item_locations,
            EntityKind::Item => &self.item_locations,
        };
        map.get(name).and_then(|loc| loc.as_ref())
    }
}

/// Session-scoped working copy of a procedure with the user's edits.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveProcedure {
    pub procedure: Procedure,
    selected_items: HashMap<String, Vec<SizeQty>>,
    fixed_included: HashMap<String, bool>,
    fixed_qty_overrides: HashMap<String, String>,
    box_numbers: Vec<String>,
}

impl ActiveProcedure {
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure,
            selected_items: HashMap::new(),
            fixed_included: HashMap::new(),
            fixed_qty_overrides: HashMap::new(),
            box_numbers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.procedure.name
    }

    /// Opt into a selectable item. Returns false if the procedure has no such item.
    pub fn select_item(&mut self, name: &str, sizes: Vec<SizeQty>) -> bool {
        if self.procedure.selectable_item(name).is_none() {
            return false;
        }
        self.selected_items.insert(name.to_string(), sizes);
        true
    }

    pub fn deselect_item(&mut self, name: &str) {
        self.selected_items.remove(name);
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected_items.contains_key(name)
    }

    pub fn selected_sizes(&self, name: &str) -> Option<&[SizeQty]> {
        self.selected_items.get(name).map(|sizes| sizes.as_slice())
    }

    pub fn set_fixed_included(&mut self, name: &str, included: bool) {
        self.fixed_included.insert(name.to_string(), included);
    }

    /// Fixed items are included unless explicitly deselected.
    pub fn is_fixed_included(&self, name: &str) -> bool {
        self.fixed_included.get(name).copied().unwrap_or(true)
    }

    pub fn set_fixed_qty(&mut self, name: &str, qty: impl Into<String>) {
        self.fixed_qty_overrides.insert(name.to_string(), qty.into());
    }

    /// Effective quantity: the user's override if set, else the catalog default.
    pub fn fixed_qty(&self, name: &str) -> Option<&str> {
        if let Some(qty) = self.fixed_qty_overrides.get(name) {
            if !qty.trim().is_empty() {
                return Some(qty.as_str());
            }
        }
        self.procedure.fixed_item(name).map(|item| item.qty.as_str())
    }

    pub fn add_box_number(&mut self, box_no: impl Into<String>) {
        let box_no = box_no.into().trim().to_string();
        if !box_no.is_empty() && !self.box_numbers.contains(&box_no) {
            self.box_numbers.push(box_no);
        }
    }

    pub fn remove_box_number(&mut self, box_no: &str) {
        self.box_numbers.retain(|b| b != box_no);
    }

    pub fn box_numbers(&self) -> &[String] {
        &self.box_numbers
    }

    /// Normalize the current selection into DC line items, in catalog order.
    pub fn to_dc_items(&self) -> Vec<DcItem> {
        let mut items = Vec::new();

        for fixed in &self.procedure.fixed_items {
            if !self.is_fixed_included(&fixed.name) {
                continue;
            }
            let qty = self.fixed_qty(&fixed.name).unwrap_or(DEFAULT_QTY);
            items.push(DcItem {
                name: fixed.name.clone(),
                sizes: vec![SizeQty::new("", qty)],
                procedure: self.procedure.name.clone(),
                is_selectable: false,
            });
        }

        // Size variants of one base name share a single selection
        let mut emitted = HashSet::new();
        for item in &self.procedure.items {
            let Some(chosen) = self.selected_items.get(&item.name) else {
                continue;
            };
            if !emitted.insert(item.name.as_str()) {
                continue;
            }
            let mut sizes: Vec<SizeQty> = chosen
                .iter()
                .filter(|s| !s.size.trim().is_empty())
                .map(|s| SizeQty::new(s.size.trim(), qty_or_default(&s.qty)))
                .collect();
            if sizes.is_empty() {
                let qty = chosen.first().map(|s| qty_or_default(&s.qty)).unwrap_or(DEFAULT_QTY);
                sizes.push(SizeQty::new("", qty));
            }
            items.push(DcItem {
                name: item.name.clone(),
                sizes,
                procedure: self.procedure.name.clone(),
                is_selectable: true,
            });
        }

        items
    }
}

/// Trimmed quantity, or the default when blank.
pub(crate) fn qty_or_default(qty: &str) -> &str {
    let trimmed = qty.trim();
    if trimmed.is_empty() {
        DEFAULT_QTY
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_procedure() -> Procedure {
        let mut procedure = Procedure::new("Hip Replacement");
        procedure.items = vec![
            SelectableItem {
                raw: "Screw {6mm:2, 8mm:1}".into(),
                name: "Screw".into(),
                sizes: vec![SizeQty::new("6mm", "2"), SizeQty::new("8mm", "1")],
            },
            SelectableItem {
                raw: "Plate".into(),
                name: "Plate".into(),
                sizes: vec![],
            },
        ];
        procedure.fixed_items = vec![
            FixedItem {
                name: "Rod".into(),
                qty: "2".into(),
            },
            FixedItem {
                name: "Cup".into(),
                qty: "1".into(),
            },
        ];
        procedure.instruments = vec!["Drill".into()];
        procedure
    }

    #[test]
    fn test_new_procedure_defaults() {
        let procedure = Procedure::new("Knee");
        assert_eq!(procedure.procedure_type, "General");
        assert!(procedure.items.is_empty());
    }

    #[test]
    fn test_fixed_items_included_by_default() {
        let active = ActiveProcedure::new(make_procedure());
        assert!(active.is_fixed_included("Rod"));
        assert_eq!(active.fixed_qty("Rod"), Some("2"));
    }

    #[test]
    fn test_fixed_qty_override() {
        let mut active = ActiveProcedure::new(make_procedure());
        active.set_fixed_qty("Rod", "5");
        assert_eq!(active.fixed_qty("Rod"), Some("5"));

        // Blank override falls back to the catalog default
        active.set_fixed_qty("Rod", "  ");
        assert_eq!(active.fixed_qty("Rod"), Some("2"));
    }

    #[test]
    fn test_select_unknown_item_rejected() {
        let mut active = ActiveProcedure::new(make_procedure());
        assert!(!active.select_item("Nail", vec![]));
        assert!(active.select_item("Screw", vec![SizeQty::new("6mm", "1")]));
        assert!(active.is_selected("Screw"));
    }

    #[test]
    fn test_to_dc_items() {
        let mut active = ActiveProcedure::new(make_procedure());
        active.set_fixed_included("Cup", false);
        active.select_item(
            "Screw",
            vec![SizeQty::new("6mm", ""), SizeQty::new("", "4")],
        );
        active.select_item("Plate", vec![]);

        let items = active.to_dc_items();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].name, "Rod");
        assert!(!items[0].is_selectable);
        assert_eq!(items[0].sizes, vec![SizeQty::new("", "2")]);

        assert_eq!(items[1].name, "Screw");
        assert_eq!(items[1].sizes, vec![SizeQty::new("6mm", "1")]);

        assert_eq!(items[2].name, "Plate");
        assert_eq!(items[2].sizes, vec![SizeQty::new("", "1")]);
        assert_eq!(items[2].procedure, "Hip Replacement");
    }

    #[test]
    fn test_variants_of_one_item_emitted_once() {
        let mut procedure = make_procedure();
        procedure.items.push(SelectableItem {
            raw: "Screw {10mm:2}".into(),
            name: "Screw".into(),
            sizes: vec![SizeQty::new("10mm", "2")],
        });
        let mut active = ActiveProcedure::new(procedure);
        active.set_fixed_included("Rod", false);
        active.set_fixed_included("Cup", false);
        active.select_item("Screw", vec![SizeQty::new("6mm", "3")]);

        let items = active.to_dc_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Screw");
        assert_eq!(items[0].sizes, vec![SizeQty::new("6mm", "3")]);
    }

    #[test]
    fn test_box_numbers_deduplicated() {
        let mut active = ActiveProcedure::new(make_procedure());
        active.add_box_number("B1");
        active.add_box_number(" B1 ");
        active.add_box_number("");
        active.add_box_number("B2");
        assert_eq!(active.box_numbers(), &["B1".to_string(), "B2".to_string()]);

        active.remove_box_number("B1");
        assert_eq!(active.box_numbers(), &["B2".to_string()]);
    }
}
