//! Vault file format.
//!
//! The vault is a single JSON array of `SecretRecord` objects followed
//! by a newline, sorted by key.  The whole file is rewritten on every
//! mutation, which keeps the format trivial to inspect and diff but
//! puts a practical ceiling of a few hundred records on the store.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::record::SecretRecord;
use super::validation::is_valid_key;
use crate::errors::{Result, SecretSyncError};
use crate::fsutil::atomic_write;

/// Read the vault file into a key-ordered map.
///
/// A missing file is an empty vault.  An unreadable or malformed file,
/// a record with an invalid key, or a duplicated key is a `Storage`
/// error: the vault refuses to start on data it cannot trust.
pub fn read_records(path: &Path) -> Result<BTreeMap<String, SecretRecord>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(SecretSyncError::Storage(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    let records: Vec<SecretRecord> = serde_json::from_slice(&data).map_err(|e| {
        SecretSyncError::Storage(format!("{} is not a valid vault file: {e}", path.display()))
    })?;

    let mut seen = BTreeSet::new();
    let mut map = BTreeMap::new();
    for record in records {
        if !is_valid_key(&record.key) {
            return Err(SecretSyncError::Storage(format!(
                "vault contains invalid key '{}'",
                record.key
            )));
        }
        if !seen.insert(record.key.clone()) {
            return Err(SecretSyncError::Storage(format!(
                "vault contains duplicate key '{}'",
                record.key
            )));
        }
        map.insert(record.key.clone(), record);
    }

    Ok(map)
}

/// Serialize every record and atomically replace the vault file.
///
/// The file is created owner read/write only.
pub fn write_records(path: &Path, records: &BTreeMap<String, SecretRecord>) -> Result<()> {
    let list: Vec<&SecretRecord> = records.values().collect();
    let mut buf = serde_json::to_vec_pretty(&list)
        .map_err(|e| SecretSyncError::Serialization(format!("vault records: {e}")))?;
    buf.push(b'\n');

    atomic_write(path, &buf, true)
}
