//! Storage capability for saved DCs.
//!
//! Two implementations:
//! - [`HttpDcStore`]: the spreadsheet-backed remote endpoint
//! - [`crate::db::Database`]: the local SQLite store
//!
//! Updates replace the full record keyed by `id`. There is no revision
//! token, so concurrent writers to one record are last-write-wins.

mod http;
mod row;

pub use http::*;
pub use row::*;

use thiserror::Error;

use crate::models::SavedDc;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage endpoint not configured: {0}")]
    Configuration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted collection of saved DCs.
pub trait DcStore {
    /// Every stored record.
    fn list_all(&self) -> StoreResult<Vec<SavedDc>>;

    /// A single record by ID.
    fn get(&self, id: &str) -> StoreResult<Option<SavedDc>> {
        Ok(self.list_all()?.into_iter().find(|dc| dc.id == id))
    }

    /// Store a new record.
    fn append(&self, dc: &SavedDc) -> StoreResult<()>;

    /// Replace a record by ID. Returns false if no record has that ID.
    fn update(&self, dc: &SavedDc) -> StoreResult<bool>;

    /// Remove a record by ID. Returns false if no record has that ID.
    fn delete(&self, id: &str) -> StoreResult<bool>;
}
