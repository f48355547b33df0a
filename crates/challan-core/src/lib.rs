//! Challan Core Library
//!
//! Delivery-challan (DC) tracking for surgical implant kits: a procedure
//! catalog decoded from a spreadsheet and a DC lifecycle with an
//! append-only audit history.
//!
//! # Architecture
//!
//! ```text
//!   Catalog sheet (CSV)            Operator
//!          │                          │
//!     [catalog::feed]           [ChallanDraft]
//!          │                          │
//!   Procedure ⇄ row codec ───▶ create ▼
//!          │               ┌─────────────────────┐
//!    CatalogSearch         │  Lifecycle engine   │
//!                          │  pending → returned │
//!                          │  → cash → completed │
//!                          └──────────┬──────────┘
//!                                     │ DcStore
//!                         ┌───────────┴───────────┐
//!                         ▼                       ▼
//!                   HttpDcStore               Database
//!                (spreadsheet rows)       (local SQLite)
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: Catalog row codec, CSV feed, fuzzy search, composite-name edits
//! - [`lifecycle`]: DC state machine, engine, deletion policy
//! - [`store`]: Storage capability and the spreadsheet-backed implementation
//! - [`db`]: SQLite store, packing checklist, local flags
//! - [`models`]: Domain types (Procedure, SavedDc, HistoryEntry, etc.)
//! - [`session`]: Operator login state
//! - [`config`]: Startup configuration

pub mod catalog;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogFeed, CatalogSearch, SearchIndex};
pub use config::CoreConfig;
pub use db::Database;
pub use lifecycle::{apply_transition, DeletionPolicy, Lifecycle, LifecycleError, Transition};
pub use models::{
    ActiveProcedure, ChallanDraft, DcItem, DcStatus, EntityKind, HistoryAction, HistoryEntry,
    NewDc, Procedure, SavedDc, SizeQty,
};
pub use session::Session;
pub use store::{DcStore, HttpDcStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lifecycle::{Clock, LifecycleResult, SystemClock};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ChallanError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for ChallanError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => ChallanError::NotFound(what),
            other => ChallanError::DatabaseError(other.to_string()),
        }
    }
}

impl From<StoreError> for ChallanError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Configuration(msg) => ChallanError::Configuration(msg),
            StoreError::NotFound(what) => ChallanError::NotFound(what),
            StoreError::Transport(msg) => ChallanError::StorageError(msg),
            StoreError::Json(e) => ChallanError::SerializationError(e.to_string()),
            StoreError::Database(e) => e.into(),
        }
    }
}

impl From<LifecycleError> for ChallanError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::NotFound(id) => ChallanError::NotFound(id),
            LifecycleError::Validation(msg) => ChallanError::InvalidInput(msg),
            e @ LifecycleError::InvalidTransition { .. } => {
                ChallanError::InvalidTransition(e.to_string())
            }
            LifecycleError::Unauthorized(msg) => ChallanError::Unauthorized(msg),
            LifecycleError::Store(e) => e.into(),
        }
    }
}

impl From<models::DraftError> for ChallanError {
    fn from(e: models::DraftError) -> Self {
        ChallanError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for ChallanError {
    fn from(e: serde_json::Error) -> Self {
        ChallanError::SerializationError(e.to_string())
    }
}

impl From<anyhow::Error> for ChallanError {
    fn from(e: anyhow::Error) -> Self {
        ChallanError::Configuration(format!("{:#}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for ChallanError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ChallanError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the core with configuration read from the environment (and `.env`).
#[uniffi::export]
pub fn open_core_from_env() -> Result<Arc<ChallanCore>, ChallanError> {
    let config = CoreConfig::from_env()?;
    let db = Database::open(config.db_path())?;
    Ok(Arc::new(ChallanCore::new(db, &config)?))
}

/// Open the core with explicit configuration.
#[uniffi::export]
pub fn open_core(config: FfiCoreConfig) -> Result<Arc<ChallanCore>, ChallanError> {
    let config: CoreConfig = config.into();
    let db = Database::open(config.db_path())?;
    Ok(Arc::new(ChallanCore::new(db, &config)?))
}

/// Create an in-memory, offline core (for testing).
#[uniffi::export]
pub fn open_core_in_memory() -> Result<Arc<ChallanCore>, ChallanError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ChallanCore::new(db, &CoreConfig::default())?))
}

/// Install the default log subscriber. Returns false if one was already set.
#[uniffi::export]
pub fn init_logging() -> bool {
    logging::init_logging()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe core wrapper for FFI.
///
/// DCs live in the spreadsheet store when one is configured, otherwise in
/// the local database.
#[derive(uniffi::Object)]
pub struct ChallanCore {
    db: Arc<Mutex<Database>>,
    remote: Option<HttpDcStore>,
    feed: Option<CatalogFeed>,
    catalog: Mutex<Option<Catalog>>,
    session: Mutex<Session>,
    policy: DeletionPolicy,
    clock: SystemClock,
}

impl ChallanCore {
    /// Wire the core around an opened database. Unset URLs leave that collaborator off.
    pub fn new(db: Database, config: &CoreConfig) -> Result<Self, ChallanError> {
        let remote = unless_unconfigured(HttpDcStore::from_config(config))?;
        let feed = unless_unconfigured(CatalogFeed::from_config(config))?;
        let session = Session::restore(&db)?;

        tracing::info!(
            remote_store = remote.is_some(),
            catalog_feed = feed.is_some(),
            authenticated = session.is_authenticated(),
            "challan core opened"
        );

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            remote,
            feed,
            catalog: Mutex::new(None),
            session: Mutex::new(session),
            policy: DeletionPolicy::from_config(config),
            clock: SystemClock,
        })
    }

    fn require_login(&self) -> Result<(), ChallanError> {
        if self.session.lock()?.is_authenticated() {
            Ok(())
        } else {
            Err(ChallanError::Unauthorized("log in first".into()))
        }
    }

    /// Run `f` against the lifecycle engine over the active store.
    fn with_lifecycle<T>(
        &self,
        f: impl FnOnce(&Lifecycle<'_, dyn DcStore>) -> LifecycleResult<T>,
    ) -> Result<T, ChallanError> {
        // The local database lock is only held when it backs the engine
        match &self.remote {
            Some(remote) => {
                let store: &(dyn DcStore + 'static) = remote;
                let engine = Lifecycle::new(store, &self.clock);
                Ok(f(&engine)?)
            }
            None => {
                let db = self.db.lock()?;
                let store: &(dyn DcStore + 'static) = &*db;
                let engine = Lifecycle::new(store, &self.clock);
                Ok(f(&engine)?)
            }
        }
    }

    fn transition(&self, id: &str, transition: Transition) -> Result<FfiSavedDc, ChallanError> {
        self.require_login()?;
        let dc = self.with_lifecycle(|engine| engine.transition(id, transition))?;
        Ok(dc.into())
    }

    fn with_catalog<T>(&self, f: impl FnOnce(&Catalog) -> T) -> Result<T, ChallanError> {
        let catalog = self.catalog.lock()?;
        let catalog = catalog
            .as_ref()
            .ok_or_else(|| ChallanError::NotFound("catalog not loaded".into()))?;
        Ok(f(catalog))
    }

    fn install_catalog(&self, procedures: Vec<Procedure>) -> Result<u32, ChallanError> {
        let catalog = Catalog::from_procedures(procedures);
        let count = catalog.len() as u32;
        *self.catalog.lock()? = Some(catalog);
        Ok(count)
    }

    fn build_draft(&self, draft: FfiDraft) -> Result<NewDc, ChallanError> {
        let mut working = ChallanDraft {
            hospital_name: draft.hospital_name,
            dc_no: draft.dc_no,
            material_type: draft.material_type,
            received_by: draft.received_by,
            remarks: draft.remarks,
            box_numbers: draft.box_numbers,
            ..Default::default()
        };

        if !draft.procedures.is_empty() {
            let catalog = self.catalog.lock()?;
            let catalog = catalog
                .as_ref()
                .ok_or_else(|| ChallanError::NotFound("catalog not loaded".into()))?;

            for selection in draft.procedures {
                let procedure = catalog
                    .get(&selection.name)
                    .ok_or_else(|| ChallanError::NotFound(format!("procedure {}", selection.name)))?;
                let mut active = ActiveProcedure::new(procedure.clone());

                for item in selection.selected_items {
                    let sizes = item.sizes.into_iter().map(SizeQty::from).collect();
                    if !active.select_item(&item.name, sizes) {
                        return Err(ChallanError::InvalidInput(format!(
                            "{} has no item {}",
                            selection.name, item.name
                        )));
                    }
                }
                for name in &selection.excluded_fixed_items {
                    active.set_fixed_included(name, false);
                }
                for over in selection.fixed_qty_overrides {
                    active.set_fixed_qty(&over.name, over.qty);
                }
                for box_no in selection.box_numbers {
                    active.add_box_number(box_no);
                }
                working.add_procedure(active);
            }
        }

        for item in draft.manual_items {
            working.add_manual_item(&item.name, item.sizes.into_iter().map(SizeQty::from).collect());
        }
        for instrument in &draft.manual_instruments {
            working.add_manual_instrument(instrument);
        }

        Ok(working.build()?)
    }
}

fn unless_unconfigured<T>(result: store::StoreResult<T>) -> Result<Option<T>, ChallanError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::Configuration(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[uniffi::export]
impl ChallanCore {
    // =========================================================================
    // Session
    // =========================================================================

    pub fn login(&self) -> Result<(), ChallanError> {
        let db = self.db.lock()?;
        self.session.lock()?.login(&db, self.clock.now())?;
        Ok(())
    }

    pub fn logout(&self) -> Result<(), ChallanError> {
        let db = self.db.lock()?;
        self.session.lock()?.logout(&db)?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool, ChallanError> {
        Ok(self.session.lock()?.is_authenticated())
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Fetch the catalog sheet and rebuild the search indices. Returns the procedure count.
    pub fn refresh_catalog(&self) -> Result<u32, ChallanError> {
        let feed = self
            .feed
            .as_ref()
            .ok_or_else(|| ChallanError::Configuration("catalog feed URL is not set".into()))?;
        let procedures = feed.fetch()?;
        self.install_catalog(procedures)
    }

    /// Load the catalog from CSV text already in hand.
    pub fn load_catalog_csv(&self, csv: String) -> Result<u32, ChallanError> {
        self.install_catalog(catalog::parse_catalog_csv(&csv))
    }

    pub fn procedure_names(&self) -> Result<Vec<String>, ChallanError> {
        self.with_catalog(|c| c.procedures().iter().map(|p| p.name.clone()).collect())
    }

    pub fn get_procedure(&self, name: String) -> Result<Option<FfiProcedure>, ChallanError> {
        self.with_catalog(|c| c.get(&name).map(FfiProcedure::from))
    }

    pub fn search_procedures(&self, query: String) -> Result<Vec<String>, ChallanError> {
        self.with_catalog(|c| owned(c.search().search_procedures(&query)))
    }

    pub fn search_items(&self, query: String) -> Result<Vec<String>, ChallanError> {
        self.with_catalog(|c| owned(c.search().search_items(&query)))
    }

    pub fn search_instruments(&self, query: String) -> Result<Vec<String>, ChallanError> {
        self.with_catalog(|c| owned(c.search().search_instruments(&query)))
    }

    /// First catalog procedure listing `instrument`.
    pub fn instrument_origin(&self, instrument: String) -> Result<Option<String>, ChallanError> {
        self.with_catalog(|c| c.search().instrument_origin(&instrument).map(str::to_string))
    }

    /// Strip one part from a composite item name. `None` means the edit is rejected.
    pub fn remove_item_part(&self, name: String, part: String, is_fixed: bool) -> Option<String> {
        if is_fixed {
            catalog::remove_fixed_item_part(&name, &part)
        } else {
            catalog::remove_selectable_item_part(&name, &part)
        }
    }

    /// Encode an edited item as it is written back to the sheet.
    pub fn format_item(&self, item: FfiEditableItem) -> String {
        catalog::format_item_for_row(&item.into())
    }

    /// Tab-separated catalog row for pasting back into the sheet.
    pub fn export_procedure_tsv(&self, name: String) -> Result<Option<String>, ChallanError> {
        self.with_catalog(|c| {
            c.get(&name)
                .map(|p| catalog::to_tsv_line(&catalog::encode_procedure_row(p)))
        })
    }

    // =========================================================================
    // DC Lifecycle
    // =========================================================================

    /// Save a new DC from the working draft.
    pub fn create_dc(&self, draft: FfiDraft) -> Result<FfiSavedDc, ChallanError> {
        self.require_login()?;
        let new_dc = self.build_draft(draft)?;
        let dc = self.with_lifecycle(|engine| engine.create(new_dc))?;
        Ok(dc.into())
    }

    pub fn mark_returned(
        &self,
        id: String,
        returned_by: String,
        remarks: Option<String>,
    ) -> Result<FfiSavedDc, ChallanError> {
        self.transition(
            &id,
            Transition::MarkReturned {
                returned_by,
                remarks,
            },
        )
    }

    /// Complete a returned DC, or a cash DC (recorded as `MOVE_CASH_TO_COMPLETED`).
    pub fn link_invoice(
        &self,
        id: String,
        invoice_ref: String,
        remarks: Option<String>,
    ) -> Result<FfiSavedDc, ChallanError> {
        self.transition(
            &id,
            Transition::LinkInvoice {
                invoice_ref,
                remarks,
            },
        )
    }

    pub fn move_to_cash(
        &self,
        id: String,
        amount: f64,
        remarks: Option<String>,
    ) -> Result<FfiSavedDc, ChallanError> {
        self.transition(&id, Transition::MoveToCash { amount, remarks })
    }

    pub fn move_back_to_pending(&self, id: String) -> Result<FfiSavedDc, ChallanError> {
        self.transition(&id, Transition::MoveBackToPending)
    }

    pub fn move_back_to_returned(&self, id: String) -> Result<FfiSavedDc, ChallanError> {
        self.transition(&id, Transition::MoveBackToReturned)
    }

    /// Delete a DC. Records past `pending` need the shared password.
    pub fn delete_dc(&self, id: String, password: Option<String>) -> Result<(), ChallanError> {
        self.require_login()?;
        self.with_lifecycle(|engine| engine.delete_protected(&id, password.as_deref(), &self.policy))
    }

    pub fn get_dc(&self, id: String) -> Result<FfiSavedDc, ChallanError> {
        let dc = self.with_lifecycle(|engine| engine.get(&id))?;
        Ok(dc.into())
    }

    pub fn list_dcs(&self) -> Result<Vec<FfiSavedDc>, ChallanError> {
        let dcs = self.with_lifecycle(|engine| engine.list())?;
        Ok(dcs.into_iter().map(FfiSavedDc::from).collect())
    }

    pub fn list_dcs_by_status(&self, status: String) -> Result<Vec<FfiSavedDc>, ChallanError> {
        let status: DcStatus = status.parse().map_err(ChallanError::InvalidInput)?;
        let dcs = self.with_lifecycle(|engine| engine.list_by_status(status))?;
        Ok(dcs.into_iter().map(FfiSavedDc::from).collect())
    }

    // =========================================================================
    // Packing Checklist
    // =========================================================================

    pub fn set_packed(
        &self,
        procedure_name: String,
        kind: FfiEntityKind,
        name: String,
        packed: bool,
    ) -> Result<(), ChallanError> {
        let db = self.db.lock()?;
        let key = models::PackingEntry::entity_key(kind.into(), &name);
        db.set_packed(&procedure_name, &key, packed, self.clock.now())?;
        Ok(())
    }

    pub fn packing_checklist(
        &self,
        procedure_name: String,
    ) -> Result<Vec<FfiPackingEntry>, ChallanError> {
        let db = self.db.lock()?;
        let entries = db.list_packing(&procedure_name)?;
        Ok(entries.into_iter().map(FfiPackingEntry::from).collect())
    }

    pub fn clear_packing(&self, procedure_name: String) -> Result<u32, ChallanError> {
        let db = self.db.lock()?;
        Ok(db.clear_packing(&procedure_name)? as u32)
    }
}

fn owned(names: Vec<&String>) -> Vec<String> {
    names.into_iter().cloned().collect()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe core configuration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCoreConfig {
    pub catalog_url: Option<String>,
    pub store_url: Option<String>,
    pub db_path: String,
    pub delete_password_sha256: Option<String>,
    pub http_timeout_secs: u64,
}

impl From<FfiCoreConfig> for CoreConfig {
    fn from(config: FfiCoreConfig) -> Self {
        CoreConfig::new(
            config.catalog_url,
            config.store_url,
            config.db_path.into(),
            config.delete_password_sha256,
            Duration::from_secs(config.http_timeout_secs),
        )
    }
}

/// FFI-safe size/quantity pair.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSizeQty {
    pub size: String,
    pub qty: String,
}

impl From<FfiSizeQty> for SizeQty {
    fn from(s: FfiSizeQty) -> Self {
        SizeQty::new(s.size, s.qty)
    }
}

impl From<SizeQty> for FfiSizeQty {
    fn from(s: SizeQty) -> Self {
        Self {
            size: s.size,
            qty: s.qty,
        }
    }
}

/// FFI-safe catalog procedure.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProcedure {
    pub name: String,
    pub procedure_type: String,
    pub items: Vec<FfiSelectableItem>,
    pub fixed_items: Vec<FfiFixedItem>,
    pub instruments: Vec<String>,
}

impl From<&Procedure> for FfiProcedure {
    fn from(procedure: &Procedure) -> Self {
        Self {
            name: procedure.name.clone(),
            procedure_type: procedure.procedure_type.clone(),
            items: procedure
                .items
                .iter()
                .map(|item| FfiSelectableItem {
                    raw: item.raw.clone(),
                    name: item.name.clone(),
                    sizes: item.sizes.iter().cloned().map(FfiSizeQty::from).collect(),
                    image: procedure.image(EntityKind::Item, &item.name).map(str::to_string),
                })
                .collect(),
            fixed_items: procedure
                .fixed_items
                .iter()
                .map(|item| FfiFixedItem {
                    name: item.name.clone(),
                    qty: item.qty.clone(),
                    image: procedure
                        .image(EntityKind::FixedItem, &item.name)
                        .map(str::to_string),
                })
                .collect(),
            instruments: procedure.instruments.clone(),
        }
    }
}

/// FFI-safe selectable item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSelectableItem {
    pub raw: String,
    pub name: String,
    pub sizes: Vec<FfiSizeQty>,
    pub image: Option<String>,
}

/// FFI-safe fixed item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFixedItem {
    pub name: String,
    pub qty: String,
    pub image: Option<String>,
}

/// FFI-safe catalog editor item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEditableItem {
    pub name: String,
    pub sizes: Vec<FfiSizeQty>,
    pub is_fixed: bool,
}

impl From<FfiEditableItem> for catalog::EditableItem {
    fn from(item: FfiEditableItem) -> Self {
        catalog::EditableItem {
            name: item.name,
            sizes: item.sizes.into_iter().map(SizeQty::from).collect(),
            is_fixed: item.is_fixed,
        }
    }
}

/// FFI-safe working DC.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDraft {
    pub hospital_name: String,
    pub dc_no: String,
    pub material_type: String,
    pub received_by: String,
    pub remarks: String,
    pub procedures: Vec<FfiProcedureSelection>,
    pub manual_items: Vec<FfiItemSelection>,
    pub manual_instruments: Vec<String>,
    pub box_numbers: Vec<String>,
}

/// What the operator chose from one catalog procedure.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProcedureSelection {
    pub name: String,
    pub selected_items: Vec<FfiItemSelection>,
    pub excluded_fixed_items: Vec<String>,
    pub fixed_qty_overrides: Vec<FfiFixedQty>,
    pub box_numbers: Vec<String>,
}

/// Quantity override for a fixed item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFixedQty {
    pub name: String,
    pub qty: String,
}

/// FFI-safe item choice with its sizes.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiItemSelection {
    pub name: String,
    pub sizes: Vec<FfiSizeQty>,
}

/// FFI-safe DC line item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDcItem {
    pub name: String,
    pub sizes: Vec<FfiSizeQty>,
    pub procedure: String,
    pub is_selectable: bool,
}

impl From<DcItem> for FfiDcItem {
    fn from(item: DcItem) -> Self {
        Self {
            name: item.name,
            sizes: item.sizes.into_iter().map(FfiSizeQty::from).collect(),
            procedure: item.procedure,
            is_selectable: item.is_selectable,
        }
    }
}

/// FFI-safe history entry. Cleared fields travel as JSON.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistoryEntry {
    pub at: String,
    pub action: String,
    pub from_status: Option<String>,
    pub to_status: String,
    pub cleared_json: Option<String>,
}

impl From<HistoryEntry> for FfiHistoryEntry {
    fn from(entry: HistoryEntry) -> Self {
        let cleared_json = entry
            .meta
            .and_then(|meta| meta.cleared)
            .and_then(|cleared| serde_json::to_string(&cleared).ok());
        Self {
            at: entry.at.to_rfc3339(),
            action: entry.action.to_string(),
            from_status: entry.from_status.map(|s| s.to_string()),
            to_status: entry.to_status.to_string(),
            cleared_json,
        }
    }
}

/// FFI-safe saved DC.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSavedDc {
    pub id: String,
    pub hospital_name: String,
    pub dc_no: String,
    pub material_type: String,
    pub received_by: String,
    pub remarks: String,
    pub saved_at: String,
    pub status: String,
    pub items: Vec<FfiDcItem>,
    pub instruments: Vec<String>,
    pub box_numbers: Vec<String>,
    pub returned_by: Option<String>,
    pub returned_at: Option<String>,
    pub returned_remarks: Option<String>,
    pub invoice_ref: Option<String>,
    pub invoice_remarks: Option<String>,
    pub cash_at: Option<String>,
    pub cash_amount: Option<f64>,
    pub cash_remarks: Option<String>,
    pub total_quantity: u64,
    pub history: Vec<FfiHistoryEntry>,
}

impl From<SavedDc> for FfiSavedDc {
    fn from(dc: SavedDc) -> Self {
        let total_quantity = dc.total_quantity();
        Self {
            id: dc.id,
            hospital_name: dc.hospital_name,
            dc_no: dc.dc_no,
            material_type: dc.material_type,
            received_by: dc.received_by,
            remarks: dc.remarks,
            saved_at: dc.saved_at.to_rfc3339(),
            status: dc.status.to_string(),
            items: dc.items.into_iter().map(FfiDcItem::from).collect(),
            instruments: dc.instruments,
            box_numbers: dc.box_numbers,
            returned_by: dc.returned_by,
            returned_at: dc.returned_at.map(|at| at.to_rfc3339()),
            returned_remarks: dc.returned_remarks,
            invoice_ref: dc.invoice_ref,
            invoice_remarks: dc.invoice_remarks,
            cash_at: dc.cash_at.map(|at| at.to_rfc3339()),
            cash_amount: dc.cash_amount,
            cash_remarks: dc.cash_remarks,
            total_quantity,
            history: dc.history.into_iter().map(FfiHistoryEntry::from).collect(),
        }
    }
}

/// FFI-safe entity kind for checklist keys.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiEntityKind {
    Instrument,
    FixedItem,
    Item,
}

impl From<FfiEntityKind> for EntityKind {
    fn from(kind: FfiEntityKind) -> Self {
        match kind {
            FfiEntityKind::Instrument => EntityKind::Instrument,
            FfiEntityKind::FixedItem => EntityKind::FixedItem,
            FfiEntityKind::Item => EntityKind::Item,
        }
    }
}

/// FFI-safe packing checklist entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPackingEntry {
    pub procedure_name: String,
    pub entity_key: String,
    pub packed: bool,
    pub packed_at: Option<String>,
}

impl From<models::PackingEntry> for FfiPackingEntry {
    fn from(entry: models::PackingEntry) -> Self {
        Self {
            procedure_name: entry.procedure_name,
            entity_key: entry.entity_key,
            packed: entry.packed,
            packed_at: entry.packed_at.map(|at| at.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_remote_calls_leave_local_database_unlocked() {
        // A port nothing listens on, so the remote call fails fast
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let config = CoreConfig::new(
            None,
            Some(format!("http://{}/dcs", addr)),
            ":memory:".into(),
            None,
            Duration::from_secs(2),
        );
        let core = Arc::new(ChallanCore::new(Database::open_in_memory().unwrap(), &config).unwrap());
        let db = Arc::clone(&core.db);
        let _guard = db.lock().unwrap();

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(&core);
        std::thread::spawn(move || {
            let result = worker.with_lifecycle(|engine| engine.list());
            tx.send(result.map(|dcs| dcs.len())).ok();
        });

        let result = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("remote listing blocked on the local database lock");
        assert!(matches!(result, Err(ChallanError::StorageError(_))));
    }
}
