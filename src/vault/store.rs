//! High-level vault operations.
//!
//! `VaultStore` wraps the file format layer and the crypto layer so that
//! the rest of the application works with simple method calls like
//! `store.create(NewSecret::new("DB_URL").value("postgres://..."))`.
//!
//! Records live in memory behind a `RwLock`.  Mutations hold the write
//! lock while they rewrite the vault file, and only swap the new map in
//! once the file is on disk, so readers always see the persisted state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::keys::MasterKey;
use crate::errors::{Result, SecretSyncError};

use super::format;
use super::record::{
    ExportedSecret, NewSecret, RevealedSecret, SecretPage, SecretPatch, SecretRecord,
    SecretSummary, Visibility,
};
use super::validation::{normalize_page, validate_key, validate_value};

/// The main vault handle.  Create one with `VaultStore::open`; a handle
/// only exists once the master key and the vault file are both usable.
pub struct VaultStore {
    /// Path to the vault file on disk.
    path: PathBuf,

    /// The master key (zeroized on drop).
    master_key: MasterKey,

    /// Recorded as `created_by` / `updated_by`.
    actor: String,

    /// In-memory map of key -> record, mirroring the file.
    records: RwLock<BTreeMap<String, SecretRecord>>,
}

impl VaultStore {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open the vault at `path` (an absent file is an empty vault).
    ///
    /// Fails with `Storage` if the file exists but cannot be trusted.
    pub fn open(path: &Path, master_key: MasterKey) -> Result<Self> {
        let records = format::read_records(path)?;

        info!(
            path = %path.display(),
            records = records.len(),
            key = %master_key.fingerprint(),
            "vault opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            master_key,
            actor: "admin".to_string(),
            records: RwLock::new(records),
        })
    }

    /// Resolve the master key from `key_env` and open the vault.
    ///
    /// Fails with `Config` when the key is missing or malformed; no
    /// handle is ever produced without a valid key.
    pub fn open_with_env(path: &Path, key_env: &str) -> Result<Self> {
        let master_key = MasterKey::from_env(key_env)?;
        Self::open(path, master_key)
    }

    /// Set the actor recorded on mutations.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Add a new record and persist immediately.
    pub fn create(&self, input: NewSecret) -> Result<SecretSummary> {
        validate_key(&input.key)?;
        if let Some(value) = &input.value {
            validate_value(value)?;
        }

        let mut records = self.write()?;
        if records.contains_key(&input.key) {
            return Err(SecretSyncError::Duplicate(input.key));
        }

        let encrypted_value = match input.value.as_deref() {
            Some(value) => self.seal(&input.key, value)?,
            None => None,
        };

        let now = Utc::now();
        let record = SecretRecord {
            key: input.key.clone(),
            encrypted_value,
            visibility: input.visibility,
            source: input.source,
            required: input.required,
            created_at: now,
            created_by: self.actor.clone(),
            updated_at: now,
            updated_by: self.actor.clone(),
        };
        let summary = record.summary();

        let mut next = records.clone();
        next.insert(input.key, record);
        self.commit(&mut records, next)?;

        info!(key = %summary.key, has_value = summary.has_value, "secret created");
        Ok(summary)
    }

    /// Change one or more fields of an existing record.
    ///
    /// A supplied value is re-encrypted under a fresh nonce.
    pub fn update(&self, key: &str, patch: SecretPatch) -> Result<SecretSummary> {
        validate_key(key)?;
        if patch.is_empty() {
            return Err(SecretSyncError::Validation(
                "update requires at least one of value, visibility, source, required".into(),
            ));
        }
        if let Some(value) = &patch.value {
            validate_value(value)?;
        }

        let mut records = self.write()?;
        let mut record = records
            .get(key)
            .cloned()
            .ok_or_else(|| SecretSyncError::NotFound(key.to_string()))?;

        if let Some(value) = patch.value.as_deref() {
            record.encrypted_value = self.seal(key, value)?;
        }
        if let Some(visibility) = patch.visibility {
            record.visibility = visibility;
        }
        if let Some(source) = patch.source {
            record.source = source;
        }
        if let Some(required) = patch.required {
            record.required = required;
        }
        record.updated_at = Utc::now();
        record.updated_by = self.actor.clone();
        let summary = record.summary();

        let mut next = records.clone();
        next.insert(key.to_string(), record);
        self.commit(&mut records, next)?;

        info!(key, value_changed = patch.value.is_some(), "secret updated");
        Ok(summary)
    }

    /// Delete a record, returning its last summary.
    pub fn remove(&self, key: &str) -> Result<SecretSummary> {
        validate_key(key)?;

        let mut records = self.write()?;
        let mut next = records.clone();
        let removed = next
            .remove(key)
            .ok_or_else(|| SecretSyncError::NotFound(key.to_string()))?;
        self.commit(&mut records, next)?;

        info!(key, "secret removed");
        Ok(removed.summary())
    }

    /// Decrypt a single visible record.
    ///
    /// Hidden records are `Forbidden` whether or not they hold a value.
    pub fn reveal(&self, key: &str) -> Result<RevealedSecret> {
        validate_key(key)?;

        let records = self.read()?;
        let record = records
            .get(key)
            .ok_or_else(|| SecretSyncError::NotFound(key.to_string()))?;

        if record.visibility != Visibility::Visible {
            return Err(SecretSyncError::Forbidden(key.to_string()));
        }

        let value = match &record.encrypted_value {
            Some(sealed) => Some(self.open_sealed(key, sealed)?),
            None => None,
        };

        Ok(RevealedSecret {
            key: key.to_string(),
            value,
        })
    }

    /// One page of redacted summaries, sorted by key.
    ///
    /// `search` is a case-insensitive substring filter on the key.
    pub fn list(&self, page: usize, page_size: usize, search: Option<&str>) -> Result<SecretPage> {
        let (page, page_size) = normalize_page(page, page_size);
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_uppercase);

        let records = self.read()?;
        let matching: Vec<&SecretRecord> = records
            .values()
            .filter(|r| needle.as_deref().map_or(true, |n| r.key.contains(n)))
            .collect();

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(SecretRecord::summary)
            .collect();

        Ok(SecretPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Every record, sorted by key, without values.
    pub fn summaries(&self) -> Result<Vec<SecretSummary>> {
        Ok(self.read()?.values().map(SecretRecord::summary).collect())
    }

    /// Decrypt every record regardless of visibility.
    ///
    /// This is the only bulk-decrypt path and exists for the sync engine.
    pub fn export_for_sync(&self) -> Result<BTreeMap<String, ExportedSecret>> {
        let records = self.read()?;
        let mut out = BTreeMap::new();

        for record in records.values() {
            let value = match &record.encrypted_value {
                Some(sealed) => Some(self.open_sealed(&record.key, sealed)?),
                None => None,
            };
            out.insert(
                record.key.clone(),
                ExportedSecret {
                    key: record.key.clone(),
                    value,
                    required: record.required,
                    source: record.source,
                },
            );
        }

        debug!(records = out.len(), "vault exported for sync");
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records in the vault.
    pub fn secret_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Returns `true` if the vault contains `key`.
    ///
    /// This is a metadata-only check; no decryption is performed.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    /// Fingerprint of the master key in use.
    pub fn key_fingerprint(&self) -> String {
        self.master_key.fingerprint()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, SecretRecord>>> {
        self.records
            .read()
            .map_err(|_| SecretSyncError::Storage("vault lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, SecretRecord>>> {
        self.records
            .write()
            .map_err(|_| SecretSyncError::Storage("vault lock poisoned".into()))
    }

    /// Persist `next`, then make it the in-memory state.
    fn commit(
        &self,
        current: &mut RwLockWriteGuard<'_, BTreeMap<String, SecretRecord>>,
        next: BTreeMap<String, SecretRecord>,
    ) -> Result<()> {
        format::write_records(&self.path, &next)?;
        **current = next;
        Ok(())
    }

    /// Encrypt `value` for `key`; an empty value stores nothing.
    fn seal(&self, key: &str, value: &str) -> Result<Option<String>> {
        if value.is_empty() {
            return Ok(None);
        }
        encrypt(self.master_key.as_bytes(), key.as_bytes(), value.as_bytes()).map(Some)
    }

    fn open_sealed(&self, key: &str, sealed: &str) -> Result<Zeroizing<String>> {
        let plaintext = decrypt(self.master_key.as_bytes(), key.as_bytes(), sealed)?;

        // On error, zeroize the bytes inside the error before discarding.
        String::from_utf8(plaintext).map(Zeroizing::new).map_err(|e| {
            let mut bad_bytes = e.into_bytes();
            bad_bytes.zeroize();
            SecretSyncError::Decrypt(format!("value for '{key}' is not valid UTF-8"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::record::SecretSource;
    use tempfile::TempDir;

    fn store() -> (TempDir, VaultStore) {
        let dir = TempDir::new().unwrap();
        let store = VaultStore::open(&dir.path().join("vault.json"), MasterKey::new([3u8; 32]))
            .unwrap()
            .with_actor("tester");
        (dir, store)
    }

    #[test]
    fn create_records_actor_and_redacts() {
        let (_dir, store) = store();
        let summary = store
            .create(NewSecret::new("API_KEY").value("sk-1"))
            .unwrap();

        assert!(summary.has_value);
        assert_eq!(summary.created_by, "tester");
        assert_eq!(summary.visibility, Visibility::Hidden);
        assert_eq!(summary.source, SecretSource::App);
    }

    #[test]
    fn create_with_empty_value_stores_nothing() {
        let (_dir, store) = store();
        let summary = store.create(NewSecret::new("EMPTY").value("")).unwrap();
        assert!(!summary.has_value);
    }

    #[test]
    fn update_reencrypts_with_fresh_nonce() {
        let (dir, store) = store();
        store
            .create(NewSecret::new("TOKEN").value("same"))
            .unwrap();
        let first = format::read_records(&dir.path().join("vault.json")).unwrap()["TOKEN"]
            .encrypted_value
            .clone()
            .unwrap();

        store
            .update(
                "TOKEN",
                SecretPatch {
                    value: Some("same".into()),
                    ..SecretPatch::default()
                },
            )
            .unwrap();
        let second = format::read_records(&dir.path().join("vault.json")).unwrap()["TOKEN"]
            .encrypted_value
            .clone()
            .unwrap();

        assert_ne!(first, second);
        assert_ne!(first.split(':').next(), second.split(':').next());
    }

    #[test]
    fn update_can_clear_value() {
        let (_dir, store) = store();
        store.create(NewSecret::new("TOKEN").value("x")).unwrap();
        let summary = store
            .update(
                "TOKEN",
                SecretPatch {
                    value: Some(String::new()),
                    ..SecretPatch::default()
                },
            )
            .unwrap();
        assert!(!summary.has_value);
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let dir = TempDir::new().unwrap();
        // The vault path is a directory, so every persist fails.
        let path = dir.path().join("vault.json");
        std::fs::create_dir(&path).unwrap();
        let store = VaultStore {
            path,
            master_key: MasterKey::new([1u8; 32]),
            actor: "tester".into(),
            records: RwLock::new(BTreeMap::new()),
        };

        assert!(store.create(NewSecret::new("A_KEY").value("v")).is_err());
        assert_eq!(store.secret_count().unwrap(), 0);
    }

    #[test]
    fn list_searches_case_insensitively_and_pages() {
        let (_dir, store) = store();
        for key in ["DB_URL", "DB_PASSWORD", "API_KEY", "SMTP_HOST"] {
            store.create(NewSecret::new(key)).unwrap();
        }

        let page = store.list(1, 10, Some("db")).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].key, "DB_PASSWORD");

        let page = store.list(2, 3, None).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].key, "SMTP_HOST");
    }
}
