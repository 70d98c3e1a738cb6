//! Timestamped env-file backups: `<file>.<timestamp>.bak` next to the
//! original.  The timestamp is fixed-width, so name order is time order.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::errors::{Result, SecretSyncError};
use crate::fsutil::atomic_write;

/// UTC, no separators, microsecond precision (20 digits).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%6f";
const TIMESTAMP_LEN: usize = 20;
const SUFFIX: &str = ".bak";

pub fn backup_name(file_name: &str, at: DateTime<Utc>) -> String {
    format!("{file_name}.{}{SUFFIX}", at.format(TIMESTAMP_FORMAT))
}

/// Copy `env_path` byte for byte into a new backup and return its path.
pub fn create_backup(env_path: &Path) -> Result<PathBuf> {
    let file_name = file_name(env_path)?;
    let data = fs::read(env_path)?;

    let target = env_path.with_file_name(backup_name(file_name, Utc::now()));
    atomic_write(&target, &data, true)?;
    info!(backup = %target.display(), "backup taken");
    Ok(target)
}

/// Backups of `env_path`, oldest first.  A missing directory has none.
pub fn list_backups(env_path: &Path) -> Result<Vec<PathBuf>> {
    let file_name = file_name(env_path)?;
    let dir = match env_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| is_backup_of(name, file_name))
        })
        .map(|entry| entry.path())
        .collect();
    backups.sort();
    Ok(backups)
}

/// The most recent backup, if any.
pub fn latest_backup(env_path: &Path) -> Result<Option<PathBuf>> {
    Ok(list_backups(env_path)?.pop())
}

/// Delete all but the newest `keep` backups; `keep == 0` keeps everything.
/// Returns how many were deleted.
pub fn prune_backups(env_path: &Path, keep: usize) -> Result<usize> {
    if keep == 0 {
        return Ok(0);
    }

    let backups = list_backups(env_path)?;
    let excess = backups.len().saturating_sub(keep);
    let mut removed = 0;
    for old in &backups[..excess] {
        match fs::remove_file(old) {
            Ok(()) => {
                debug!(backup = %old.display(), "pruned backup");
                removed += 1;
            }
            Err(e) => warn!(backup = %old.display(), error = %e, "could not prune backup"),
        }
    }
    Ok(removed)
}

fn is_backup_of(name: &str, file_name: &str) -> bool {
    name.strip_prefix(file_name)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .is_some_and(|ts| ts.len() == TIMESTAMP_LEN && ts.bytes().all(|b| b.is_ascii_digit()))
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        SecretSyncError::Config(format!("{} has no usable file name", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn backup_name_uses_fixed_width_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(backup_name(".env", at), ".env.20240309070501000000.bak");
    }

    #[test]
    fn backup_is_exact_copy_and_listed() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join(".env");
        fs::write(&env, "A=1\n# c\n").unwrap();

        let backup = create_backup(&env).unwrap();
        assert_eq!(fs::read(&backup).unwrap(), b"A=1\n# c\n");
        assert_eq!(latest_backup(&env).unwrap(), Some(backup));
    }

    #[test]
    fn listing_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join(".env");
        fs::write(dir.path().join(".env.local.20240101000000000000.bak"), "").unwrap();
        fs::write(dir.path().join(".env.notatimestamp.bak"), "").unwrap();
        fs::write(dir.path().join(".env.20240101000000000000.bak"), "").unwrap();

        let backups = list_backups(&env).unwrap();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].ends_with(".env.20240101000000000000.bak"));
    }

    #[test]
    fn latest_is_lexicographically_greatest() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join(".env");
        for ts in ["20240101000000000000", "20250101000000000000", "20240601000000000000"] {
            fs::write(dir.path().join(format!(".env.{ts}.bak")), ts).unwrap();
        }
        let latest = latest_backup(&env).unwrap().unwrap();
        assert_eq!(fs::read_to_string(latest).unwrap(), "20250101000000000000");
    }

    #[test]
    fn prune_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join(".env");
        for i in 0..5 {
            fs::write(dir.path().join(format!(".env.2024010100000000000{i}.bak")), "").unwrap();
        }

        assert_eq!(prune_backups(&env, 0).unwrap(), 0);
        assert_eq!(prune_backups(&env, 2).unwrap(), 3);
        let left = list_backups(&env).unwrap();
        assert_eq!(left.len(), 2);
        assert!(left[1].ends_with(".env.20240101000000000004.bak"));
    }

    #[test]
    fn missing_directory_has_no_backups() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join("nope").join(".env");
        assert!(list_backups(&env).unwrap().is_empty());
        assert!(latest_backup(&env).unwrap().is_none());
    }
}
