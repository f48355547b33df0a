//! Operator session, persisted as a local flag so it survives restarts.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::{Database, DbResult, AUTHENTICATED_FLAG};

/// Whether the operator is logged in on this device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    authenticated: bool,
    authenticated_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Restore the session recorded in the local database.
    pub fn restore(db: &Database) -> DbResult<Self> {
        let Some(raw) = db.get_flag(AUTHENTICATED_FLAG)? else {
            return Ok(Self::default());
        };

        // Older flag values carry no timestamp
        let authenticated_at = DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .ok();
        Ok(Self {
            authenticated: true,
            authenticated_at,
        })
    }

    pub fn login(&mut self, db: &Database, now: DateTime<Utc>) -> DbResult<()> {
        db.set_flag(
            AUTHENTICATED_FLAG,
            &now.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        self.authenticated = true;
        self.authenticated_at = Some(now);
        tracing::info!("operator logged in");
        Ok(())
    }

    pub fn logout(&mut self, db: &Database) -> DbResult<()> {
        db.clear_flag(AUTHENTICATED_FLAG)?;
        self.authenticated = false;
        self.authenticated_at = None;
        tracing::info!("operator logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }
}
