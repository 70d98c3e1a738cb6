//! Persisted snapshot of the last sync or rollback, and the telemetry
//! view built from it.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SecretSyncError};
use crate::fsutil::atomic_write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Sync,
    Rollback,
}

impl SyncAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Rollback => "rollback",
        }
    }
}

/// Overall outcome of the last action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastStatus {
    Ok,
    Degraded,
    Rollback,
}

impl LastStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Rollback => "rollback",
        }
    }
}

/// Outcome for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Every required key has a value (sync) or the backup was restored (rollback).
    Ok,
    /// Written, but some required keys have no value.
    Degraded,
    /// Rollback found nothing to restore.
    Skipped,
    /// The env file could not be read or written.
    Failed,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub status: ServiceStatus,
    pub missing_count: usize,
    pub updated_count: usize,
    pub changed: bool,

    /// Rollback only: whether a backup was restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored: Option<bool>,

    /// Rollback only: why nothing was restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// File name of the backup taken (sync) or restored (rollback).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceSummary {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Failed,
            missing_count: 0,
            updated_count: 0,
            changed: false,
            restored: None,
            reason: None,
            backup: None,
            error: Some(error.into()),
        }
    }
}

/// What the last sync/rollback did, per service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub action: SyncAction,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceSummary>,
    pub queue_length: usize,
    pub required_missing: usize,
    pub last_status: LastStatus,
}

impl SyncState {
    /// Services that ended in `status`.
    pub fn services_with(&self, status: ServiceStatus) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, s)| s.status == status)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Read-only health view of the vault and the last sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsTelemetry {
    pub total_secrets: usize,
    pub missing_required: usize,
    pub last_action: Option<SyncAction>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_status: Option<LastStatus>,
    pub queue_length: usize,
    pub services: BTreeMap<String, ServiceSummary>,
}

/// Load the last snapshot; `None` if no action has run yet.
pub fn read_state(path: &Path) -> Result<Option<SyncState>> {
    match fs::read(path) {
        Ok(data) => serde_json::from_slice(&data).map(Some).map_err(|e| {
            SecretSyncError::Storage(format!("{} is not a valid sync state: {e}", path.display()))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SecretSyncError::Storage(format!(
            "cannot read {}: {e}",
            path.display()
        ))),
    }
}

/// Overwrite the snapshot.
pub fn write_state(path: &Path, state: &SyncState) -> Result<()> {
    let mut buf = serde_json::to_vec_pretty(state)
        .map_err(|e| SecretSyncError::Serialization(format!("sync state: {e}")))?;
    buf.push(b'\n');
    atomic_write(path, &buf, true)
}
