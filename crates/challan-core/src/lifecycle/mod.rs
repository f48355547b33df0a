//! DC lifecycle engine.
//!
//! Records are created once, changed only through [`Transition`]s and
//! deleted explicitly. Each transition is merged in memory and persisted
//! with a single full-record update.

mod clock;
mod policy;
mod transition;

pub use clock::*;
pub use policy::*;
pub use transition::*;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{DcStatus, DraftError, HistoryAction, NewDc, SavedDc};
use crate::store::{DcStore, StoreError};

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("DC not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{action} is not allowed from status {status}")]
    InvalidTransition {
        action: HistoryAction,
        status: DcStatus,
    },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<DraftError> for LifecycleError {
    fn from(e: DraftError) -> Self {
        LifecycleError::Validation(e.to_string())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Lifecycle operations over a DC store.
pub struct Lifecycle<'a, S: DcStore + ?Sized> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: DcStore + ?Sized> Lifecycle<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Save a new DC as `pending`.
    pub fn create(&self, new_dc: NewDc) -> LifecycleResult<SavedDc> {
        if new_dc.hospital_name.trim().is_empty() {
            return Err(DraftError::MissingField("hospitalName").into());
        }
        if new_dc.dc_no.trim().is_empty() {
            return Err(DraftError::MissingField("dcNo").into());
        }

        let dc = SavedDc::create(new_dc, Uuid::new_v4().to_string(), self.clock.now());
        self.store.append(&dc)?;
        tracing::info!(id = %dc.id, dc_no = %dc.dc_no, "created DC");
        Ok(dc)
    }

    /// Apply a transition to the stored record and persist the result.
    pub fn transition(&self, id: &str, transition: Transition) -> LifecycleResult<SavedDc> {
        let current = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        let next = match apply_transition(&current, &transition, self.clock.now()) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(id, status = %current.status, error = %e, "transition rejected");
                return Err(e);
            }
        };

        if !self.store.update(&next)? {
            return Err(LifecycleError::NotFound(id.to_string()));
        }

        tracing::info!(
            id,
            from = %current.status,
            to = %next.status,
            action = %transition.action_from(current.status),
            "DC transitioned"
        );
        Ok(next)
    }

    /// Delete a record. Unknown IDs are an error.
    pub fn delete(&self, id: &str) -> LifecycleResult<()> {
        if !self.store.delete(id)? {
            return Err(LifecycleError::NotFound(id.to_string()));
        }
        tracing::info!(id, "deleted DC");
        Ok(())
    }

    /// Delete a record, checking `policy` first.
    pub fn delete_protected(
        &self,
        id: &str,
        password: Option<&str>,
        policy: &DeletionPolicy,
    ) -> LifecycleResult<()> {
        let dc = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        if !policy.allows(&dc, password) {
            tracing::warn!(id, status = %dc.status, "protected delete refused");
            return Err(LifecycleError::Unauthorized(format!(
                "deleting a {} DC requires the password",
                dc.status
            )));
        }
        self.delete(id)
    }

    pub fn list(&self) -> LifecycleResult<Vec<SavedDc>> {
        Ok(self.store.list_all()?)
    }

    pub fn get(&self, id: &str) -> LifecycleResult<SavedDc> {
        self.store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    pub fn list_by_status(&self, status: DcStatus) -> LifecycleResult<Vec<SavedDc>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|dc| dc.status == status)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreResult;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;

    /// In-memory store that counts writes.
    #[derive(Default)]
    struct MemoryStore {
        dcs: RefCell<Vec<SavedDc>>,
        updates: RefCell<usize>,
    }

    impl DcStore for MemoryStore {
        fn list_all(&self) -> StoreResult<Vec<SavedDc>> {
            Ok(self.dcs.borrow().clone())
        }

        fn append(&self, dc: &SavedDc) -> StoreResult<()> {
            self.dcs.borrow_mut().push(dc.clone());
            Ok(())
        }

        fn update(&self, dc: &SavedDc) -> StoreResult<bool> {
            *self.updates.borrow_mut() += 1;
            let mut dcs = self.dcs.borrow_mut();
            match dcs.iter_mut().find(|d| d.id == dc.id) {
                Some(slot) => {
                    *slot = dc.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn delete(&self, id: &str) -> StoreResult<bool> {
            let mut dcs = self.dcs.borrow_mut();
            let before = dcs.len();
            dcs.retain(|d| d.id != id);
            Ok(dcs.len() < before)
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    fn new_dc() -> NewDc {
        NewDc {
            hospital_name: "City Hospital".into(),
            dc_no: "DC-42".into(),
            instruments: vec!["Drill".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults_to_pending() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);

        let dc = engine.create(new_dc()).unwrap();
        assert_eq!(dc.status, DcStatus::Pending);
        assert_eq!(dc.history.len(), 1);
        assert_eq!(dc.history[0].action, HistoryAction::Created);
        assert_eq!(dc.history[0].to_status, DcStatus::Pending);
        assert_eq!(dc.saved_at, clock.0);
        assert_eq!(engine.list().unwrap(), vec![dc]);
    }

    #[test]
    fn test_create_rejects_missing_fields() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);

        let result = engine.create(NewDc {
            dc_no: "  ".into(),
            ..new_dc()
        });
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
        assert!(engine.list().unwrap().is_empty());
    }

    #[test]
    fn test_transition_persists_single_update() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);
        let dc = engine.create(new_dc()).unwrap();

        let returned = engine
            .transition(
                &dc.id,
                Transition::MarkReturned {
                    returned_by: "Asha".into(),
                    remarks: None,
                },
            )
            .unwrap();

        assert_eq!(*store.updates.borrow(), 1);
        assert_eq!(engine.get(&dc.id).unwrap(), returned);
        assert_eq!(engine.list_by_status(DcStatus::Returned).unwrap().len(), 1);
        assert!(engine.list_by_status(DcStatus::Pending).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_transition_writes_nothing() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);
        let dc = engine.create(new_dc()).unwrap();

        let result = engine.transition(&dc.id, Transition::MoveBackToReturned);
        assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })));
        assert_eq!(*store.updates.borrow(), 0);
        assert_eq!(engine.get(&dc.id).unwrap(), dc);
    }

    #[test]
    fn test_unknown_id() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);

        assert!(matches!(
            engine.transition("nope", Transition::MoveBackToPending),
            Err(LifecycleError::NotFound(_))
        ));
        assert!(matches!(engine.delete("nope"), Err(LifecycleError::NotFound(_))));
        assert!(matches!(engine.get("nope"), Err(LifecycleError::NotFound(_))));
    }

    #[test]
    fn test_delete_removes_from_list() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);
        let dc = engine.create(new_dc()).unwrap();

        engine.delete(&dc.id).unwrap();
        assert!(engine.list().unwrap().is_empty());
        assert!(matches!(engine.delete(&dc.id), Err(LifecycleError::NotFound(_))));
    }

    #[test]
    fn test_delete_protected() {
        let store = MemoryStore::default();
        let clock = clock();
        let engine = Lifecycle::new(&store, &clock);
        let policy = DeletionPolicy::with_password("s3cret");

        let pending = engine.create(new_dc()).unwrap();
        engine.delete_protected(&pending.id, None, &policy).unwrap();

        let dc = engine.create(new_dc()).unwrap();
        engine
            .transition(
                &dc.id,
                Transition::MarkReturned {
                    returned_by: "Asha".into(),
                    remarks: None,
                },
            )
            .unwrap();

        assert!(matches!(
            engine.delete_protected(&dc.id, Some("guess"), &policy),
            Err(LifecycleError::Unauthorized(_))
        ));
        assert!(engine.get(&dc.id).is_ok());

        engine.delete_protected(&dc.id, Some("s3cret"), &policy).unwrap();
        assert!(engine.list().unwrap().is_empty());
    }
}
