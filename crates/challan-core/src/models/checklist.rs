//! Image-packing checklist models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Packing state of one entity of one procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackingEntry {
    pub procedure_name: String,
    /// Entity name, usually prefixed by its kind (see [`PackingEntry::entity_key`])
    pub entity_key: String,
    pub packed: bool,
    pub packed_at: Option<DateTime<Utc>>,
}

impl PackingEntry {
    /// Build the checklist key for an entity of a procedure.
    pub fn entity_key(kind: super::EntityKind, name: &str) -> String {
        let prefix = match kind {
            super::EntityKind::Instrument => "instrument",
            super::EntityKind::FixedItem => "fixed",
            super::EntityKind::Item => "item",
        };
        format!("{}:{}", prefix, name)
    }
}
