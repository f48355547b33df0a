//! Row codec: flat `|`-delimited catalog rows ⇄ [`Procedure`].
//!
//! Column order is fixed:
//!
//! | # | column | encoding |
//! |---|---|---|
//! | 0 | name | plain |
//! | 1 | items | `Screw {6mm:2, 8mm:1}\|Plate` |
//! | 2 | fixedItems | `Rod\|Cup` |
//! | 3 | fixedQty | `2\|1`, parallel to fixedItems |
//! | 4 | instruments | `Drill\|Hammer` |
//! | 5 | type | plain, defaults to `General` |
//! | 6–8 | instrument/fixedItem/item images | URLs parallel to their name list |
//! | 9–11 | item/fixedItem/instrument locations | flat `room\|rack\|box\|room\|...` |

use std::collections::HashMap;

use crate::models::{
    qty_or_default, FixedItem, ItemLocation, Procedure, SelectableItem, SizeQty,
    DEFAULT_PROCEDURE_TYPE, DEFAULT_QTY,
};

/// Number of columns in a catalog row.
pub const CATALOG_COLUMNS: usize = 12;

/// Header row written by [`encode_procedure_row`] exports.
pub const CATALOG_HEADER: [&str; CATALOG_COLUMNS] = [
    "Procedure Name",
    "Items",
    "Fixed Items",
    "Fixed Qty",
    "Instruments",
    "Type",
    "Instrument Images",
    "Fixed Item Images",
    "Item Images",
    "Item Locations",
    "Fixed Item Locations",
    "Instrument Locations",
];

const COL_NAME: usize = 0;
const COL_ITEMS: usize = 1;
const COL_FIXED_ITEMS: usize = 2;
const COL_FIXED_QTY: usize = 3;
const COL_INSTRUMENTS: usize = 4;
const COL_TYPE: usize = 5;
const COL_INSTRUMENT_IMAGES: usize = 6;
const COL_FIXED_ITEM_IMAGES: usize = 7;
const COL_ITEM_IMAGES: usize = 8;
const COL_ITEM_LOCATIONS: usize = 9;
const COL_FIXED_ITEM_LOCATIONS: usize = 10;
const COL_INSTRUMENT_LOCATIONS: usize = 11;

const LIST_SEPARATOR: &str = "|";

/// An item as edited in the catalog editor, ready to be written back to a row.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableItem {
    pub name: String,
    pub sizes: Vec<SizeQty>,
    pub is_fixed: bool,
}

/// Decode one catalog row into a procedure.
///
/// Never fails: missing columns read as empty, misaligned parallel lists
/// degrade to `None` entries.
pub fn parse_catalog_row<S: AsRef<str>>(row: &[S]) -> Procedure {
    let field = |idx: usize| row.get(idx).map(|s| s.as_ref()).unwrap_or("");

    let items: Vec<SelectableItem> = split_names(field(COL_ITEMS))
        .iter()
        .map(|token| parse_selectable_item(token))
        .filter(|item| !item.name.is_empty())
        .collect();

    let fixed_names = split_names(field(COL_FIXED_ITEMS));
    let fixed_qtys = split_positional(field(COL_FIXED_QTY));
    let fixed_items: Vec<FixedItem> = fixed_names
        .iter()
        .enumerate()
        .map(|(i, name)| FixedItem {
            name: name.clone(),
            qty: fixed_qtys
                .get(i)
                .cloned()
                .flatten()
                .unwrap_or_else(|| DEFAULT_QTY.to_string()),
        })
        .collect();

    let instruments = split_names(field(COL_INSTRUMENTS));
    let item_names: Vec<String> = items.iter().map(|item| item.name.clone()).collect();

    let procedure_type = match field(COL_TYPE).trim() {
        "" => DEFAULT_PROCEDURE_TYPE.to_string(),
        t => t.to_string(),
    };

    Procedure {
        name: field(COL_NAME).trim().to_string(),
        procedure_type,
        instrument_images: parse_images(field(COL_INSTRUMENT_IMAGES), &instruments),
        fixed_item_images: parse_images(field(COL_FIXED_ITEM_IMAGES), &fixed_names),
        item_images: parse_images(field(COL_ITEM_IMAGES), &item_names),
        instrument_locations: parse_locations(field(COL_INSTRUMENT_LOCATIONS), &instruments),
        fixed_item_locations: parse_locations(field(COL_FIXED_ITEM_LOCATIONS), &fixed_names),
        item_locations: parse_locations(field(COL_ITEM_LOCATIONS), &item_names),
        items,
        fixed_items,
        instruments,
    }
}

/// Parse one selectable-item token: `<name> {<size>:<qty>, ...}` or a bare name.
pub fn parse_selectable_item(token: &str) -> SelectableItem {
    let raw = token.trim();

    if let (Some(open), true) = (raw.find('{'), raw.ends_with('}')) {
        let name = raw[..open].trim();
        let inner = &raw[open + 1..raw.len() - 1];
        let sizes = inner.split(',').filter_map(parse_size_pair).collect();
        return SelectableItem {
            raw: raw.to_string(),
            name: name.to_string(),
            sizes,
        };
    }

    SelectableItem {
        raw: raw.to_string(),
        name: base_name(raw).to_string(),
        sizes: Vec::new(),
    }
}

/// Item name with any `{...}` suffix stripped.
pub fn base_name(raw: &str) -> &str {
    match raw.find('{') {
        Some(open) => raw[..open].trim(),
        None => raw.trim(),
    }
}

fn parse_size_pair(pair: &str) -> Option<SizeQty> {
    let (size, qty) = match pair.split_once(':') {
        Some((size, qty)) => (size.trim(), qty),
        None => (pair.trim(), ""),
    };
    if size.is_empty() {
        return None;
    }
    Some(SizeQty::new(size, qty_or_default(qty)))
}

/// Split a name list, dropping blank tokens.
fn split_names(field: &str) -> Vec<String> {
    field
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a parallel list, keeping positions. Blank tokens become `None`.
fn split_positional(field: &str) -> Vec<Option<String>> {
    if field.trim().is_empty() {
        return Vec::new();
    }
    field
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .map(|s| (!s.is_empty()).then(|| s.to_string()))
        .collect()
}

fn parse_images(field: &str, names: &[String]) -> HashMap<String, Option<String>> {
    let urls = split_positional(field);
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), urls.get(i).cloned().flatten()))
        .collect()
}

fn parse_locations(field: &str, names: &[String]) -> HashMap<String, Option<ItemLocation>> {
    let tokens: Vec<&str> = if field.trim().is_empty() {
        Vec::new()
    } else {
        field.split(LIST_SEPARATOR).map(str::trim).collect()
    };

    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let location = tokens.get(i * 3..i * 3 + 3).and_then(|triple| {
                if triple.iter().all(|part| part.is_empty()) {
                    return None;
                }
                Some(ItemLocation {
                    room: triple[0].to_string(),
                    rack: triple[1].to_string(),
                    box_no: triple[2].to_string(),
                })
            });
            (name.clone(), location)
        })
        .collect()
}

/// Encode one item for the items / fixedItems columns.
pub fn format_item_for_row(item: &EditableItem) -> String {
    if item.is_fixed {
        return item.name.trim().to_string();
    }
    format_selectable(&item.name, &item.sizes)
}

fn format_selectable(name: &str, sizes: &[SizeQty]) -> String {
    let pairs: Vec<String> = sizes
        .iter()
        .filter(|s| !s.size.trim().is_empty())
        .map(|s| format!("{}:{}", s.size.trim(), qty_or_default(&s.qty)))
        .collect();

    if pairs.is_empty() {
        name.trim().to_string()
    } else {
        format!("{} {{{}}}", name.trim(), pairs.join(", "))
    }
}

/// Flatten locations into `room|rack|box|room|...`, using `""` for anything missing.
pub fn format_locations(locations: &[Option<ItemLocation>]) -> String {
    locations
        .iter()
        .flat_map(|loc| match loc {
            Some(loc) => [loc.room.as_str(), loc.rack.as_str(), loc.box_no.as_str()],
            None => ["", "", ""],
        })
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Re-encode a full procedure into its 12 catalog columns.
pub fn encode_procedure_row(procedure: &Procedure) -> Vec<String> {
    let item_names: Vec<&str> = procedure.items.iter().map(|i| i.name.as_str()).collect();
    let fixed_names: Vec<&str> = procedure
        .fixed_items
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    let instruments: Vec<&str> = procedure.instruments.iter().map(String::as_str).collect();

    let images = |map: &HashMap<String, Option<String>>, names: &[&str]| -> String {
        let urls: Vec<&str> = names
            .iter()
            .map(|n| map.get(*n).and_then(|u| u.as_deref()).unwrap_or(""))
            .collect();
        if urls.iter().all(|u| u.is_empty()) {
            String::new()
        } else {
            urls.join(LIST_SEPARATOR)
        }
    };

    let locations = |map: &HashMap<String, Option<ItemLocation>>, names: &[&str]| -> String {
        let locs: Vec<Option<ItemLocation>> = names
            .iter()
            .map(|n| map.get(*n).cloned().flatten())
            .collect();
        if locs.iter().all(Option::is_none) {
            String::new()
        } else {
            format_locations(&locs)
        }
    };

    vec![
        procedure.name.clone(),
        procedure
            .items
            .iter()
            .map(|i| format_selectable(&i.name, &i.sizes))
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        fixed_names.join(LIST_SEPARATOR),
        procedure
            .fixed_items
            .iter()
            .map(|i| qty_or_default(&i.qty))
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        instruments.join(LIST_SEPARATOR),
        procedure.procedure_type.clone(),
        images(&procedure.instrument_images, &instruments),
        images(&procedure.fixed_item_images, &fixed_names),
        images(&procedure.item_images, &item_names),
        locations(&procedure.item_locations, &item_names),
        locations(&procedure.fixed_item_locations, &fixed_names),
        locations(&procedure.instrument_locations, &instruments),
    ]
}

/// Tab-separated line for pasting a row back into the spreadsheet by hand.
pub fn to_tsv_line<S: AsRef<str>>(row: &[S]) -> String {
    row.iter()
        .map(|field| field.as_ref().replace(['\t', '\r', '\n'], " "))
        .collect::<Vec<_>>()
        .join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_hip_replacement_row() {
        let procedure = parse_catalog_row(&row(&[
            "Hip Replacement",
            "Screw {6mm:2, 8mm:1}|Plate",
            "Rod",
            "2",
            "Drill|Hammer",
            "Surgery",
            "",
            "",
            "",
            "",
            "",
            "",
        ]));

        assert_eq!(procedure.name, "Hip Replacement");
        assert_eq!(procedure.procedure_type, "Surgery");
        assert_eq!(procedure.items.len(), 2);
        assert_eq!(procedure.items[0].name, "Screw");
        assert_eq!(
            procedure.items[0].sizes,
            vec![SizeQty::new("6mm", "2"), SizeQty::new("8mm", "1")]
        );
        assert_eq!(procedure.items[1].name, "Plate");
        assert!(procedure.items[1].sizes.is_empty());
        assert_eq!(
            procedure.fixed_items,
            vec![FixedItem {
                name: "Rod".into(),
                qty: "2".into()
            }]
        );
        assert_eq!(procedure.instruments, vec!["Drill", "Hammer"]);
    }

    #[test]
    fn test_type_defaults_to_general() {
        let procedure = parse_catalog_row(&row(&["Knee", "", "", "", "", " "]));
        assert_eq!(procedure.procedure_type, "General");
    }

    #[test]
    fn test_short_row_tolerated() {
        let procedure = parse_catalog_row(&row(&["Knee", "Nail"]));
        assert_eq!(procedure.items.len(), 1);
        assert!(procedure.fixed_items.is_empty());
        assert_eq!(procedure.item_images.get("Nail"), Some(&None));
    }

    #[test]
    fn test_whitespace_and_qty_defaults() {
        let item = parse_selectable_item("  Screw  {  6mm : , 8mm:3 ,10mm, }  ");
        assert_eq!(item.name, "Screw");
        assert_eq!(
            item.sizes,
            vec![
                SizeQty::new("6mm", "1"),
                SizeQty::new("8mm", "3"),
                SizeQty::new("10mm", "1"),
            ]
        );
    }

    #[test]
    fn test_fixed_qty_shorter_than_names() {
        let procedure = parse_catalog_row(&row(&["Knee", "", "Rod|Cup|Liner", "3"]));
        let qtys: Vec<&str> = procedure.fixed_items.iter().map(|f| f.qty.as_str()).collect();
        assert_eq!(qtys, vec!["3", "1", "1"]);
    }

    #[test]
    fn test_images_align_to_base_names() {
        let procedure = parse_catalog_row(&row(&[
            "Knee",
            "Screw {6mm:1}|Plate",
            "Rod",
            "",
            "Drill|Hammer",
            "",
            "http://img/drill.png",
            "http://img/rod.png",
            "|http://img/plate.png",
        ]));

        assert_eq!(
            procedure.image(EntityKind::Instrument, "Drill"),
            Some("http://img/drill.png")
        );
        assert_eq!(procedure.image(EntityKind::Instrument, "Hammer"), None);
        assert_eq!(
            procedure.image(EntityKind::FixedItem, "Rod"),
            Some("http://img/rod.png")
        );
        assert_eq!(procedure.image(EntityKind::Item, "Screw"), None);
        assert_eq!(
            procedure.image(EntityKind::Item, "Plate"),
            Some("http://img/plate.png")
        );
    }

    #[test]
    fn test_locations_incomplete_triple_is_none() {
        let procedure = parse_catalog_row(&row(&[
            "Knee",
            "",
            "",
            "",
            "Drill|Hammer|Saw",
            "",
            "",
            "",
            "",
            "",
            "",
            "R1|A|3|R2|B",
        ]));

        assert_eq!(
            procedure.location(EntityKind::Instrument, "Drill"),
            Some(&ItemLocation {
                room: "R1".into(),
                rack: "A".into(),
                box_no: "3".into()
            })
        );
        assert_eq!(procedure.location(EntityKind::Instrument, "Hammer"), None);
        assert_eq!(procedure.location(EntityKind::Instrument, "Saw"), None);
        assert_eq!(procedure.instrument_locations.len(), 3);
    }

    #[test]
    fn test_format_item_for_row() {
        let fixed = EditableItem {
            name: "Rod".into(),
            sizes: vec![SizeQty::new("6mm", "2")],
            is_fixed: true,
        };
        assert_eq!(format_item_for_row(&fixed), "Rod");

        let selectable = EditableItem {
            name: "Screw".into(),
            sizes: vec![
                SizeQty::new("6mm", "2"),
                SizeQty::new("", "5"),
                SizeQty::new("8mm", " "),
            ],
            is_fixed: false,
        };
        assert_eq!(format_item_for_row(&selectable), "Screw {6mm:2, 8mm:1}");

        let bare = EditableItem {
            name: "Plate".into(),
            sizes: vec![SizeQty::new(" ", "3")],
            is_fixed: false,
        };
        assert_eq!(format_item_for_row(&bare), "Plate");
    }

    #[test]
    fn test_format_locations() {
        let locations = vec![
            Some(ItemLocation {
                room: "R1".into(),
                rack: "".into(),
                box_no: "7".into(),
            }),
            None,
        ];
        assert_eq!(format_locations(&locations), "R1||7|||");
    }

    #[test]
    fn test_encode_procedure_row_round_trip() {
        let original = row(&[
            "Hip Replacement",
            "Screw {6mm:2, 8mm:1}|Plate",
            "Rod|Cup",
            "2|1",
            "Drill|Hammer",
            "Surgery",
            "http://img/drill.png|",
            "",
            "",
            "R1|A|1|R1|A|2",
            "",
            "",
        ]);

        let procedure = parse_catalog_row(&original);
        let encoded = encode_procedure_row(&procedure);
        assert_eq!(encoded.len(), CATALOG_COLUMNS);
        assert_eq!(encoded, original);
        assert_eq!(parse_catalog_row(&encoded), procedure);
    }

    #[test]
    fn test_to_tsv_line() {
        let line = to_tsv_line(&["Hip", "Screw\t{6mm:1}", "a\nb"]);
        assert_eq!(line, "Hip\tScrew {6mm:1}\ta b");
    }
}
