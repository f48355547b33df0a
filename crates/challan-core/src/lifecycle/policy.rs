//! Protected deletion: records past `pending` need the shared password.

use sha2::{Digest, Sha256};

use crate::config::CoreConfig;
use crate::models::{DcStatus, SavedDc};

/// Who may delete what.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionPolicy {
    /// Lowercase hex SHA-256 of the shared password. `None` locks non-pending deletes.
    password_sha256: Option<String>,
}

impl DeletionPolicy {
    /// Policy from a stored digest.
    pub fn new(password_sha256: Option<&str>) -> Self {
        Self {
            password_sha256: password_sha256
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }

    /// Policy whose password is `password` (digested here).
    pub fn with_password(password: &str) -> Self {
        Self {
            password_sha256: Some(digest(password)),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.delete_password_sha256())
    }

    /// Whether deleting `dc` needs the password.
    pub fn requires_password(&self, dc: &SavedDc) -> bool {
        dc.status != DcStatus::Pending
    }

    /// Whether `password` may delete `dc`.
    pub fn allows(&self, dc: &SavedDc, password: Option<&str>) -> bool {
        if !self.requires_password(dc) {
            return true;
        }
        match (&self.password_sha256, password) {
            (Some(expected), Some(given)) => digest(given) == *expected,
            _ => false,
        }
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
