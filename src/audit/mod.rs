//! Audit trail: SQLite-backed history of vault mutations, reveals,
//! syncs and rollbacks, stored at `<state_dir>/audit.db`.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations silently continue without logging.  Building
//! without the `audit-log` feature turns the trail into a no-op.

#[cfg(feature = "audit-log")]
mod sqlite;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

#[cfg(feature = "audit-log")]
pub use sqlite::AuditLog;

#[cfg(not(feature = "audit-log"))]
pub use disabled::AuditLog;

pub const DB_FILE: &str = "audit.db";

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub actor: String,
    pub key_name: Option<String>,
    pub details: Option<String>,
}

/// Path of the audit database inside `state_dir`.
pub fn db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DB_FILE)
}

/// Fire-and-forget recorder bound to a state directory and an actor.
///
/// Opens the database per event, so it is safe to share and never fails
/// the operation being recorded.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    state_dir: PathBuf,
    actor: String,
}

impl AuditTrail {
    pub fn new(state_dir: impl Into<PathBuf>, actor: impl Into<String>) -> Self {
        Self {
            state_dir: state_dir.into(),
            actor: actor.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn record(&self, operation: &str, key: Option<&str>, details: Option<&str>) {
        match AuditLog::open(&self.state_dir) {
            Some(log) => log.log(operation, &self.actor, key, details),
            None => debug!(operation, "audit log unavailable"),
        }
    }

    /// Most recent entries first.
    pub fn recent(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> crate::errors::Result<Vec<AuditEntry>> {
        match AuditLog::open(&self.state_dir) {
            Some(log) => log.query(limit, since),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(not(feature = "audit-log"))]
mod disabled {
    use std::path::Path;

    use chrono::{DateTime, Utc};

    use super::AuditEntry;
    use crate::errors::Result;

    /// Stand-in when the crate is built without `audit-log`.
    pub struct AuditLog;

    impl AuditLog {
        pub fn open(_state_dir: &Path) -> Option<Self> {
            None
        }

        pub fn log(
            &self,
            _operation: &str,
            _actor: &str,
            _key_name: Option<&str>,
            _details: Option<&str>,
        ) {
        }

        pub fn query(
            &self,
            _limit: usize,
            _since: Option<DateTime<Utc>>,
        ) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }
    }
}
