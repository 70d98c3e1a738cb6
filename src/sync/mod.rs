//! Sync engine: projects the requirement ledger and the vault export
//! into each service's env file, with backups and rollback.
//!
//! Every service is handled independently.  A failure on one service is
//! recorded in its summary and the batch carries on.

pub mod backup;
pub mod envfile;
pub mod queue;
pub mod state;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::errors::{Result, SecretSyncError};
use crate::fsutil::atomic_write;
use crate::resolver::RequiredSecrets;
use crate::vault::ExportedSecret;

pub use queue::{ChangeKind, PendingSync, SyncQueue};
pub use state::{
    LastStatus, SecretsTelemetry, ServiceStatus, ServiceSummary, SyncAction, SyncState,
};

/// One service env file the engine writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub name: String,
    pub env_path: PathBuf,
}

pub struct SyncEngine {
    targets: Vec<SyncTarget>,
    state_path: PathBuf,
    keep_backups: usize,
    /// Serializes whole sync/rollback cycles.
    cycle: Mutex<()>,
    /// One lock per env file, held across read-backup-write.
    files: HashMap<String, Mutex<()>>,
}

impl SyncEngine {
    pub fn new(targets: Vec<SyncTarget>, state_path: PathBuf, keep_backups: usize) -> Self {
        let files = targets
            .iter()
            .map(|t| (t.name.clone(), Mutex::new(())))
            .collect();
        Self {
            targets,
            state_path,
            keep_backups,
            cycle: Mutex::new(()),
            files,
        }
    }

    pub fn from_settings(project_dir: &Path, settings: &Settings) -> Self {
        let targets = settings
            .services
            .iter()
            .map(|s| SyncTarget {
                name: s.name.clone(),
                env_path: project_dir.join(&s.env_file),
            })
            .collect();
        Self::new(
            targets,
            settings.sync_state_path(project_dir),
            settings.backups.keep,
        )
    }

    pub fn targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// The snapshot written by the last sync or rollback.
    pub fn last_state(&self) -> Result<Option<SyncState>> {
        state::read_state(&self.state_path)
    }

    /// Write every service's ledger keys into its env file.
    ///
    /// `snapshot_at` must be read before `ledger` and `export` were
    /// built: only queue entries queued by then are covered by this
    /// write.  A key is dropped from `queue` once every service that
    /// targets it was written; when no service failed, queued keys no
    /// service targets are dropped as well.
    pub fn sync_env_files(
        &self,
        ledger: &RequiredSecrets,
        export: &BTreeMap<String, ExportedSecret>,
        queue: &SyncQueue,
        snapshot_at: DateTime<Utc>,
    ) -> Result<SyncState> {
        let _cycle = self.lock_cycle()?;

        let mut services = BTreeMap::new();
        let mut written: BTreeSet<String> = BTreeSet::new();
        let mut unwritten: BTreeSet<String> = BTreeSet::new();
        let mut targeted: BTreeSet<String> = BTreeSet::new();
        let mut any_failed = false;

        for target in &self.targets {
            let entries: BTreeMap<String, &str> = ledger
                .for_app(&target.name)
                .map(|item| {
                    let value = export.get(&item.key).map_or("", |e| e.value_or_empty());
                    (item.key.clone(), value)
                })
                .collect();
            let missing_count = ledger.for_app(&target.name).filter(|i| i.is_missing()).count();
            targeted.extend(entries.keys().cloned());

            let summary = match self.write_service(target, &entries) {
                Ok((changed, updated_count, backup)) => {
                    written.extend(entries.keys().cloned());
                    ServiceSummary {
                        status: if missing_count == 0 {
                            ServiceStatus::Ok
                        } else {
                            ServiceStatus::Degraded
                        },
                        missing_count,
                        updated_count,
                        changed,
                        restored: None,
                        reason: None,
                        backup,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(service = %target.name, error = %e, "env file sync failed");
                    any_failed = true;
                    unwritten.extend(entries.keys().cloned());
                    let mut summary = ServiceSummary::failed(e.to_string());
                    summary.missing_count = missing_count;
                    summary
                }
            };
            services.insert(target.name.clone(), summary);
        }

        let mut done: BTreeSet<String> = written.difference(&unwritten).cloned().collect();
        if !any_failed {
            done.extend(
                queue
                    .snapshot()?
                    .into_iter()
                    .map(|p| p.key)
                    .filter(|k| !targeted.contains(k)),
            );
        }
        queue.remove_keys(&done, snapshot_at)?;

        let all_ok = services.values().all(|s| s.status == ServiceStatus::Ok);
        let snapshot = SyncState {
            action: SyncAction::Sync,
            timestamp: Utc::now(),
            services,
            queue_length: queue.len()?,
            required_missing: ledger.missing_count(),
            last_status: if all_ok {
                LastStatus::Ok
            } else {
                LastStatus::Degraded
            },
        };
        state::write_state(&self.state_path, &snapshot)?;

        info!(
            status = ?snapshot.last_status,
            missing = snapshot.required_missing,
            queue = snapshot.queue_length,
            "sync finished"
        );
        Ok(snapshot)
    }

    /// Restore each service from its latest backup, keeping keys added
    /// since.  Services without a backup are skipped.
    pub fn rollback_env_files(
        &self,
        ledger: &RequiredSecrets,
        queue: &SyncQueue,
    ) -> Result<SyncState> {
        let _cycle = self.lock_cycle()?;

        let mut services = BTreeMap::new();
        for target in &self.targets {
            let missing_count = ledger.for_app(&target.name).filter(|i| i.is_missing()).count();
            let summary = match self.restore_service(target) {
                Ok(Some((backup, changed, restored_keys))) => ServiceSummary {
                    status: ServiceStatus::Ok,
                    missing_count,
                    updated_count: restored_keys,
                    changed,
                    restored: Some(true),
                    reason: None,
                    backup: Some(backup),
                    error: None,
                },
                Ok(None) => {
                    debug!(service = %target.name, "no backup to restore");
                    ServiceSummary {
                        status: ServiceStatus::Skipped,
                        missing_count,
                        updated_count: 0,
                        changed: false,
                        restored: Some(false),
                        reason: Some("no_backup".into()),
                        backup: None,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(service = %target.name, error = %e, "rollback failed");
                    let mut summary = ServiceSummary::failed(e.to_string());
                    summary.missing_count = missing_count;
                    summary.restored = Some(false);
                    summary
                }
            };
            services.insert(target.name.clone(), summary);
        }

        let snapshot = SyncState {
            action: SyncAction::Rollback,
            timestamp: Utc::now(),
            services,
            queue_length: queue.len()?,
            required_missing: ledger.missing_count(),
            last_status: LastStatus::Rollback,
        };
        state::write_state(&self.state_path, &snapshot)?;
        info!("rollback finished");
        Ok(snapshot)
    }

    /// Merge and write one env file.  Returns (changed, updated lines,
    /// backup file name).
    fn write_service(
        &self,
        target: &SyncTarget,
        entries: &BTreeMap<String, &str>,
    ) -> Result<(bool, usize, Option<String>)> {
        let _file = self.lock_file(&target.name)?;
        let path = &target.env_path;

        let existing = read_optional(path)?;
        if existing.is_none() && entries.is_empty() {
            debug!(service = %target.name, "nothing to write");
            return Ok((false, 0, None));
        }

        let merged = envfile::merge_entries(existing.as_deref(), entries);
        if existing.as_deref() == Some(merged.content.as_str()) {
            debug!(service = %target.name, path = %path.display(), "env file unchanged");
            return Ok((false, 0, None));
        }

        let backup = match existing {
            Some(_) => {
                let taken = backup::create_backup(path)?;
                backup::prune_backups(path, self.keep_backups)?;
                taken.file_name().map(|n| n.to_string_lossy().into_owned())
            }
            None => None,
        };

        // New files are owner-only; existing ones keep their mode.
        atomic_write(path, merged.content.as_bytes(), existing.is_none())?;
        info!(
            service = %target.name,
            path = %path.display(),
            updated = merged.updated,
            "env file written"
        );
        Ok((true, merged.updated, backup))
    }

    /// Returns (backup name, changed, keys restored), or `None` when
    /// there is no backup.
    fn restore_service(&self, target: &SyncTarget) -> Result<Option<(String, bool, usize)>> {
        let _file = self.lock_file(&target.name)?;
        let path = &target.env_path;

        let Some(latest) = backup::latest_backup(path)? else {
            return Ok(None);
        };
        let backup_text = fs::read_to_string(&latest)?;
        let current = read_optional(path)?;

        let (content, carried) = envfile::restore_from_backup(&backup_text, current.as_deref());
        let changed = current.as_deref() != Some(content.as_str());
        if changed {
            atomic_write(path, content.as_bytes(), current.is_none())?;
        }

        let name = latest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(
            service = %target.name,
            backup = %name,
            carried_forward = carried,
            "env file restored"
        );
        Ok(Some((name, changed, envfile::keys_in(&backup_text).len())))
    }

    fn lock_cycle(&self) -> Result<MutexGuard<'_, ()>> {
        self.cycle
            .lock()
            .map_err(|_| SecretSyncError::Storage("sync lock poisoned".into()))
    }

    fn lock_file(&self, service: &str) -> Result<MutexGuard<'_, ()>> {
        self.files
            .get(service)
            .ok_or_else(|| SecretSyncError::Config(format!("unknown service '{service}'")))?
            .lock()
            .map_err(|_| SecretSyncError::Storage(format!("lock for '{service}' poisoned")))
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
