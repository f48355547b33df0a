//! Core runtime configuration.
//!
//! Resolved once at startup and passed into the core; nothing reads the
//! process environment after that.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

/// Catalog feed URL (CSV export of the procedure sheet).
pub const ENV_CATALOG_URL: &str = "CHALLAN_CATALOG_URL";
/// Spreadsheet endpoint for saved DCs.
pub const ENV_STORE_URL: &str = "CHALLAN_STORE_URL";
/// Local SQLite database path.
pub const ENV_DB_PATH: &str = "CHALLAN_DB_PATH";
/// SHA-256 hex digest of the shared password for deleting non-pending DCs.
pub const ENV_DELETE_PASSWORD_SHA256: &str = "CHALLAN_DELETE_PASSWORD_SHA256";
/// HTTP timeout in seconds.
pub const ENV_HTTP_TIMEOUT_SECS: &str = "CHALLAN_HTTP_TIMEOUT_SECS";

const DEFAULT_DB_PATH: &str = "challan.db";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct CoreConfig {
    catalog_url: Option<String>,
    store_url: Option<String>,
    db_path: PathBuf,
    delete_password_sha256: Option<String>,
    http_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            catalog_url: None,
            store_url: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            delete_password_sha256: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`. Blank URLs are treated as unset.
    pub fn new(
        catalog_url: Option<String>,
        store_url: Option<String>,
        db_path: PathBuf,
        delete_password_sha256: Option<String>,
        http_timeout: Duration,
    ) -> Self {
        Self {
            catalog_url: non_blank(catalog_url),
            store_url: non_blank(store_url),
            db_path,
            delete_password_sha256: non_blank(delete_password_sha256).map(|d| d.to_lowercase()),
            http_timeout,
        }
    }

    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_timeout = match lookup(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a whole number of seconds", ENV_HTTP_TIMEOUT_SECS))?;
                Duration::from_secs(secs)
            }
            _ => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let delete_password_sha256 = non_blank(lookup(ENV_DELETE_PASSWORD_SHA256));
        if let Some(digest) = &delete_password_sha256 {
            let valid = digest.len() == 64 && hex::decode(digest).is_ok();
            anyhow::ensure!(
                valid,
                "{} must be a 64-character hex SHA-256 digest",
                ENV_DELETE_PASSWORD_SHA256
            );
        }

        let db_path = non_blank(lookup(ENV_DB_PATH))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        Ok(Self::new(
            lookup(ENV_CATALOG_URL),
            lookup(ENV_STORE_URL),
            db_path,
            delete_password_sha256,
            http_timeout,
        ))
    }

    pub fn catalog_url(&self) -> Option<&str> {
        self.catalog_url.as_deref()
    }

    pub fn store_url(&self) -> Option<&str> {
        self.store_url.as_deref()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn delete_password_sha256(&self) -> Option<&str> {
        self.delete_password_sha256.as_deref()
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
