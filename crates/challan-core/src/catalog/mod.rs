//! Procedure catalog: row codec, CSV feed, search and composite-name edits.

mod codec;
mod composite;
mod feed;
mod search;

pub use codec::*;
pub use composite::*;
pub use feed::*;
pub use search::*;

use std::collections::HashSet;

use crate::models::Procedure;

/// A decoded catalog with its search indices.
#[derive(Debug, Clone)]
pub struct Catalog {
    procedures: Vec<Procedure>,
    search: CatalogSearch,
}

impl Catalog {
    /// Build a catalog. Later procedures repeating an earlier name are dropped.
    pub fn from_procedures(procedures: Vec<Procedure>) -> Self {
        let mut seen = HashSet::new();
        let procedures: Vec<Procedure> = procedures
            .into_iter()
            .filter(|p| {
                let fresh = seen.insert(p.name.clone());
                if !fresh {
                    tracing::warn!(name = %p.name, "duplicate procedure in catalog, keeping first");
                }
                fresh
            })
            .collect();

        let search = CatalogSearch::build(&procedures);
        Self { procedures, search }
    }

    /// Decode a catalog from the sheet's CSV export.
    pub fn from_csv(text: &str) -> Self {
        Self::from_procedures(parse_catalog_csv(text))
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    pub fn search(&self) -> &CatalogSearch {
        &self.search
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
