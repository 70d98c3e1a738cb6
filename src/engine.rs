//! `SecretsEngine`: the single entry point admin tooling talks to.
//!
//! Wires the vault, pending-sync queue, scanner, resolver, sync engine
//! and audit trail for one project directory.  Vault mutations go
//! through here so the queue and the audit trail stay in step with the
//! vault file.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::audit::AuditTrail;
use crate::config::Settings;
use crate::crypto::MasterKey;
use crate::errors::{Result, SecretSyncError};
use crate::resolver::{RequiredSecrets, RequirementReason, Resolver};
use crate::scanner::{KeyUsages, Scanner, UsageIndex};
use crate::sync::{ChangeKind, PendingSync, SecretsTelemetry, SyncEngine, SyncQueue, SyncState};
use crate::vault::{
    NewSecret, RevealedSecret, SecretPage, SecretPatch, SecretSource, SecretSummary, VaultStore,
};

/// Outcome of `bootstrap`: what was seeded, then what the sync did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub seeded: Vec<SecretSummary>,
    pub sync: SyncState,
}

pub struct SecretsEngine {
    project_dir: PathBuf,
    settings: Settings,
    vault: VaultStore,
    queue: SyncQueue,
    scanner: Scanner,
    resolver: Resolver,
    sync: SyncEngine,
    audit: AuditTrail,
}

impl SecretsEngine {
    /// Open the engine for `project_dir` with an explicit master key.
    pub fn open(project_dir: &Path, settings: Settings, master_key: MasterKey) -> Result<Self> {
        settings.validate()?;

        let state_dir = settings.state_dir_path(project_dir);
        fs::create_dir_all(&state_dir).map_err(|e| {
            SecretSyncError::Storage(format!("cannot create {}: {e}", state_dir.display()))
        })?;

        let vault = VaultStore::open(&settings.vault_path(project_dir), master_key)?
            .with_actor(settings.actor.clone());
        let queue = SyncQueue::open(&settings.queue_path(project_dir))?;

        Ok(Self {
            scanner: Scanner::new(project_dir, &settings),
            resolver: Resolver::from_settings(&settings),
            sync: SyncEngine::from_settings(project_dir, &settings),
            audit: AuditTrail::new(state_dir, settings.actor.clone()),
            project_dir: project_dir.to_path_buf(),
            settings,
            vault,
            queue,
        })
    }

    /// Load `.secretsync.toml` and resolve the master key from the
    /// configured environment variable.  Fails closed with `Config`.
    pub fn open_from_env(project_dir: &Path) -> Result<Self> {
        let settings = Settings::load(project_dir)?;
        let master_key = MasterKey::from_env(&settings.master_key_env)?;
        Self::open(project_dir, settings, master_key)
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn vault(&self) -> &VaultStore {
        &self.vault
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    // ── Vault ────────────────────────────────────────────────────────

    pub fn create(&self, input: NewSecret) -> Result<SecretSummary> {
        let summary = self.vault.create(input)?;
        self.queue_change(&summary.key, ChangeKind::Created);
        self.audit.record(
            "create",
            Some(&summary.key),
            Some(&format!(
                "source={} visibility={} required={} value={}",
                summary.source, summary.visibility, summary.required, summary.has_value
            )),
        );
        Ok(summary)
    }

    pub fn update(&self, key: &str, patch: SecretPatch) -> Result<SecretSummary> {
        let fields = patch_fields(&patch);
        let summary = self.vault.update(key, patch)?;
        self.queue_change(key, ChangeKind::Updated);
        self.audit.record("update", Some(key), Some(&fields));
        Ok(summary)
    }

    pub fn remove(&self, key: &str) -> Result<SecretSummary> {
        let summary = self.vault.remove(key)?;
        self.queue_change(key, ChangeKind::Removed);
        self.audit.record("remove", Some(key), None);
        Ok(summary)
    }

    /// Visibility-gated plaintext read.  Refusals are audited too.
    pub fn reveal(&self, key: &str) -> Result<RevealedSecret> {
        match self.vault.reveal(key) {
            Ok(revealed) => {
                self.audit.record("reveal", Some(key), None);
                Ok(revealed)
            }
            Err(e @ SecretSyncError::Forbidden(_)) => {
                self.audit.record("reveal-denied", Some(key), None);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn list(&self, page: usize, page_size: usize, search: Option<&str>) -> Result<SecretPage> {
        self.vault.list(page, page_size, search)
    }

    pub fn pending(&self) -> Result<Vec<PendingSync>> {
        self.queue.snapshot()
    }

    // ── Discovery ────────────────────────────────────────────────────

    pub fn usage_index(&self) -> UsageIndex {
        self.scanner.usage_index()
    }

    pub fn find_key_usages(&self, key: &str) -> Result<KeyUsages> {
        self.scanner.find_key_usages(key)
    }

    /// Scan, then resolve against the vault and the pending queue.
    pub fn required_secrets(&self) -> Result<RequiredSecrets> {
        let usage = self.scanner.usage_index();
        self.resolve(&usage)
    }

    /// Create an empty, hidden, `scanned` placeholder for every required
    /// key the vault lacks.  Keys declared by an integration are marked
    /// required.
    pub fn seed_missing(&self) -> Result<Vec<SecretSummary>> {
        let ledger = self.required_secrets()?;

        let mut integration_keys = BTreeSet::new();
        let mut absent = BTreeSet::new();
        for item in ledger.items.iter().filter(|i| !i.has_secret) {
            absent.insert(item.key.clone());
            if item
                .reasons
                .iter()
                .any(|r| matches!(r, RequirementReason::Integration { .. }))
            {
                integration_keys.insert(item.key.clone());
            }
        }

        let mut seeded = Vec::new();
        for key in absent {
            let required = integration_keys.contains(&key);
            let input = NewSecret::new(key)
                .source(SecretSource::Scanned)
                .required(required);
            match self.create(input) {
                Ok(summary) => seeded.push(summary),
                // Created by someone else since the ledger was built.
                Err(SecretSyncError::Duplicate(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!(seeded = seeded.len(), "placeholders seeded");
        Ok(seeded)
    }

    /// Discover, seed placeholders, then sync.
    pub fn bootstrap(&self) -> Result<BootstrapReport> {
        let seeded = self.seed_missing()?;
        let sync = self.sync_env_files()?;
        Ok(BootstrapReport { seeded, sync })
    }

    // ── Sync ─────────────────────────────────────────────────────────

    pub fn sync_env_files(&self) -> Result<SyncState> {
        // Changes queued after this instant may be missing from the
        // export below, so they stay queued.
        let snapshot_at = Utc::now();
        let ledger = self.required_secrets()?;
        let export = self.vault.export_for_sync()?;
        let state = self
            .sync
            .sync_env_files(&ledger, &export, &self.queue, snapshot_at)?;
        self.audit.record("sync", None, Some(&state_details(&state)));
        Ok(state)
    }

    pub fn rollback_env_files(&self) -> Result<SyncState> {
        let ledger = self.required_secrets()?;
        let state = self.sync.rollback_env_files(&ledger, &self.queue)?;
        self.audit.record("rollback", None, Some(&state_details(&state)));
        Ok(state)
    }

    pub fn last_sync_state(&self) -> Result<Option<SyncState>> {
        self.sync.last_state()
    }

    /// Vault size, missing requirements and the last sync snapshot.
    /// Read-only.
    pub fn telemetry(&self) -> Result<SecretsTelemetry> {
        let ledger = self.required_secrets()?;
        let last = self.sync.last_state()?;

        Ok(SecretsTelemetry {
            total_secrets: self.vault.secret_count()?,
            missing_required: ledger.missing_count(),
            last_action: last.as_ref().map(|s| s.action),
            last_timestamp: last.as_ref().map(|s| s.timestamp),
            last_status: last.as_ref().map(|s| s.last_status),
            queue_length: self.queue.len()?,
            services: last.map(|s| s.services).unwrap_or_default(),
        })
    }

    fn resolve(&self, usage: &UsageIndex) -> Result<RequiredSecrets> {
        let summaries = self.vault.summaries()?;
        let pending = self.queue.snapshot()?;
        Ok(self.resolver.resolve(usage, &summaries, &pending))
    }

    /// The vault write already succeeded, so a queue failure is logged
    /// rather than reported as a failed mutation.
    fn queue_change(&self, key: &str, change: ChangeKind) {
        if let Err(e) = self.queue.enqueue(key, change) {
            warn!(key, error = %e, "could not queue change for sync");
        }
    }
}

/// Which fields a patch touches, never the value itself.
fn patch_fields(patch: &SecretPatch) -> String {
    let mut fields = Vec::new();
    if patch.value.is_some() {
        fields.push("value".to_string());
    }
    if let Some(v) = patch.visibility {
        fields.push(format!("visibility={v}"));
    }
    if let Some(s) = patch.source {
        fields.push(format!("source={s}"));
    }
    if let Some(r) = patch.required {
        fields.push(format!("required={r}"));
    }
    fields.join(" ")
}

fn state_details(state: &SyncState) -> String {
    let services: Vec<String> = state
        .services
        .iter()
        .map(|(name, s)| format!("{name}={}", s.status.as_str()))
        .collect();
    format!(
        "status={} missing={} {}",
        state.last_status.as_str(),
        state.required_missing,
        services.join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Visibility;

    #[test]
    fn patch_fields_never_include_values() {
        let patch = SecretPatch {
            value: Some("hunter2".into()),
            visibility: Some(Visibility::Visible),
            source: None,
            required: Some(true),
        };
        let fields = patch_fields(&patch);
        assert_eq!(fields, "value visibility=visible required=true");
        assert!(!fields.contains("hunter2"));
    }
}
