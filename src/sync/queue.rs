//! Pending-sync queue: keys changed in the vault since they were last
//! written to the env files.
//!
//! Persisted as a JSON array next to the sync state so the queue
//! survives between admin invocations.  One entry per key; a newer
//! change replaces the older one.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Result, SecretSyncError};
use crate::fsutil::atomic_write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSync {
    pub key: String,
    pub change: ChangeKind,
    pub queued_at: DateTime<Utc>,
}

impl PendingSync {
    pub fn new(key: impl Into<String>, change: ChangeKind) -> Self {
        Self {
            key: key.into(),
            change,
            queued_at: Utc::now(),
        }
    }
}

/// File-backed queue, serialized by an internal mutex.
pub struct SyncQueue {
    path: PathBuf,
    entries: Mutex<Vec<PendingSync>>,
}

impl SyncQueue {
    /// Load the queue at `path`; a missing file is an empty queue.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match fs::read(path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|e| {
                SecretSyncError::Storage(format!("{} is not a valid queue: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(SecretSyncError::Storage(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Record a change to `key`, replacing any earlier entry for it.
    pub fn enqueue(&self, key: &str, change: ChangeKind) -> Result<()> {
        let mut entries = self.lock()?;
        let mut next: Vec<PendingSync> = entries.iter().filter(|p| p.key != key).cloned().collect();
        next.push(PendingSync::new(key, change));
        self.persist(&next)?;
        *entries = next;
        debug!(key, ?change, "queued for sync");
        Ok(())
    }

    /// Drop entries for `keys` queued no later than `queued_before`;
    /// changes made after that stay queued.  Returns how many went.
    pub fn remove_keys(
        &self,
        keys: &BTreeSet<String>,
        queued_before: DateTime<Utc>,
    ) -> Result<usize> {
        let mut entries = self.lock()?;
        let next: Vec<PendingSync> = entries
            .iter()
            .filter(|p| !(keys.contains(&p.key) && p.queued_at <= queued_before))
            .cloned()
            .collect();
        let removed = entries.len() - next.len();
        if removed > 0 {
            self.persist(&next)?;
            *entries = next;
        }
        Ok(removed)
    }

    /// Consistent copy of the queue, oldest first.
    pub fn snapshot(&self) -> Result<Vec<PendingSync>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<PendingSync>>> {
        self.entries
            .lock()
            .map_err(|_| SecretSyncError::Storage("sync queue lock poisoned".into()))
    }

    fn persist(&self, entries: &[PendingSync]) -> Result<()> {
        let mut buf = serde_json::to_vec_pretty(entries)
            .map_err(|e| SecretSyncError::Serialization(format!("sync queue: {e}")))?;
        buf.push(b'\n');
        atomic_write(&self.path, &buf, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn enqueue_dedupes_by_key_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync-queue.json");

        let queue = SyncQueue::open(&path).unwrap();
        queue.enqueue("A_KEY", ChangeKind::Created).unwrap();
        queue.enqueue("B_KEY", ChangeKind::Created).unwrap();
        queue.enqueue("A_KEY", ChangeKind::Updated).unwrap();

        let reopened = SyncQueue::open(&path).unwrap();
        let snapshot = reopened.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, "B_KEY");
        assert_eq!(snapshot[1].key, "A_KEY");
        assert_eq!(snapshot[1].change, ChangeKind::Updated);
    }

    #[test]
    fn remove_keys_only_touches_named_keys() {
        let dir = TempDir::new().unwrap();
        let queue = SyncQueue::open(&dir.path().join("q.json")).unwrap();
        queue.enqueue("A_KEY", ChangeKind::Created).unwrap();
        queue.enqueue("B_KEY", ChangeKind::Removed).unwrap();

        let keys: BTreeSet<String> = ["A_KEY".to_string(), "NOT_QUEUED".to_string()].into();
        assert_eq!(queue.remove_keys(&keys, Utc::now()).unwrap(), 1);
        assert_eq!(queue.len().unwrap(), 1);
        assert_eq!(queue.snapshot().unwrap()[0].key, "B_KEY");
    }

    #[test]
    fn later_changes_survive_removal() {
        let dir = TempDir::new().unwrap();
        let queue = SyncQueue::open(&dir.path().join("q.json")).unwrap();
        queue.enqueue("A_KEY", ChangeKind::Created).unwrap();
        let cutoff = queue.snapshot().unwrap()[0].queued_at - chrono::Duration::seconds(1);

        let keys: BTreeSet<String> = ["A_KEY".to_string()].into();
        assert_eq!(queue.remove_keys(&keys, cutoff).unwrap(), 0);
        assert!(!queue.is_empty().unwrap());
    }

    #[test]
    fn corrupt_queue_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("q.json");
        fs::write(&path, "nope").unwrap();
        assert!(matches!(
            SyncQueue::open(&path),
            Err(SecretSyncError::Storage(_))
        ));
    }
}
