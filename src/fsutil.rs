//! Crash-safe file writes.
//!
//! Every file secretsync owns (vault, queue, sync state, service env
//! files) is replaced the same way:
//!
//! 1. Write to a temporary file in the same directory.
//! 2. `sync_all()` the temporary file.
//! 3. Rename it over the target.
//! 4. Fsync the parent directory (Unix only).
//!
//! After a crash the target holds either the old or the new content,
//! never a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::Result;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Temporary sibling path for `path`, unique across threads of this
/// process.
fn temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    parent.join(format!(
        ".{}.tmp.{}.{seq}.{nanos}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ))
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Atomically replace `path` with `data`.
///
/// Pass `private = true` to create the file owner read/write only.
/// Parent directories are created as needed.
pub fn atomic_write(path: &Path, data: &[u8], private: bool) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    // Non-private files keep whatever mode the replaced file had.
    let inherited = if private {
        None
    } else {
        fs::metadata(path).ok().map(|m| m.permissions())
    };

    let tmp = temp_path(path);
    let written = write_synced(&tmp, data, private).and_then(|()| {
        if let Some(perms) = inherited {
            fs::set_permissions(&tmp, perms)?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    });
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written?;

    fsync_dir(&parent)?;
    Ok(())
}

fn write_synced(path: &Path, data: &[u8], private: bool) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_and_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state.json");

        atomic_write(&path, b"first", false).unwrap();
        atomic_write(&path, b"second", false).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        atomic_write(&path, b"A=1\n", false).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".env".to_string()]);
    }

    #[test]
    fn temp_paths_differ_for_the_same_target() {
        let path = Path::new("state/vault.json");
        assert_ne!(temp_path(path), temp_path(path));
    }

    #[test]
    fn concurrent_writers_never_share_a_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");

        std::thread::scope(|s| {
            for i in 0..8 {
                let path = &path;
                s.spawn(move || {
                    for _ in 0..10 {
                        atomic_write(path, format!("{i}").as_bytes(), true).unwrap();
                    }
                });
            }
        });

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["queue.json".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn private_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.json");
        atomic_write(&path, b"[]\n", true).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
