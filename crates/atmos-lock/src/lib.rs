//! Cross-process file locking.
//!
//! Generalizes `shipper-lock::LockFile` (PID/hostname/timestamp JSON
//! sidecar, atomic tmp-then-rename writes, `Drop`-based release) into a
//! primitive reusable wherever calls for "an exclusive file lock
//! around read-modify-write": the auth credential cache
//! (`<cache-file>.lock`) and the source git-cache (`git fetch`/`git
//! worktree add` per repo). Unlike the teacher's version, the lock path is
//! caller-supplied rather than a fixed `lock` filename inside a state dir,
//! and the JSON sidecar carries a free-form `label` (identity name, repo
//! URL) instead of a publish `plan_id`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata recorded alongside an acquired lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub hostname: String,
    pub acquired_at: DateTime<Utc>,
    pub label: Option<String>,
}

/// A held lock. Releases on `Drop` if not released explicitly.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    released: bool,
}

impl FileLock {
    /// Acquire the lock at `path` (typically `<target>.lock`). Fails
    /// immediately if the lock is already held and not stale.
    pub fn acquire(path: impl Into<PathBuf>, label: Option<&str>) -> Result<Self> {
        Self::acquire_with_timeout(path, label, None)
    }

    /// Acquire the lock, treating a held lock older than `stale_after` as
    /// abandoned and clearing it first.
    pub fn acquire_with_timeout(
        path: impl Into<PathBuf>,
        label: Option<&str>,
        stale_after: Option<Duration>,
    ) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create lock dir {}", parent.display()))?;
        }

        if path.exists() {
            match read_lock_info(&path) {
                Ok(info) => {
                    let stale = stale_after.is_some_and(|timeout| {
                        (Utc::now() - info.acquired_at).num_seconds().unsigned_abs()
                            > timeout.as_secs()
                    });
                    if stale {
                        fs::remove_file(&path).with_context(|| {
                            format!("failed to remove stale lock {}", path.display())
                        })?;
                    } else {
                        bail!(
                            "lock already held by pid {} on {} since {} (label: {:?})",
                            info.pid,
                            info.hostname,
                            info.acquired_at,
                            info.label
                        );
                    }
                }
                Err(_) => {
                    // Corrupt sidecar; treat as abandoned.
                    fs::remove_file(&path).with_context(|| {
                        format!("failed to remove corrupt lock {}", path.display())
                    })?;
                }
            }
        }

        let info = LockInfo {
            pid: std::process::id(),
            hostname: gethostname::gethostname().to_string_lossy().to_string(),
            acquired_at: Utc::now(),
            label: label.map(str::to_string),
        };
        write_lock_info_atomic(&path, &info)?;

        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn release(&mut self) -> Result<()> {
        if !self.released && self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove lock {}", self.path.display()))?;
        }
        self.released = true;
        Ok(())
    }

    pub fn is_locked(path: &Path) -> bool {
        path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn read_lock_info(path: &Path) -> Result<LockInfo> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read lock {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse lock {}", path.display()))
}

fn write_lock_info_atomic(path: &Path, info: &LockInfo) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(info).context("failed to serialize lock info")?;
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        file.sync_all().context("failed to sync lock file")?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename lock into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempdir().expect("tempdir");
        let lock_path = dir.path().join("auth").join("deploy.json.lock");

        let mut lock = FileLock::acquire(&lock_path, Some("deploy")).expect("acquire");
        assert!(FileLock::is_locked(&lock_path));
        lock.release().expect("release");
        assert!(!FileLock::is_locked(&lock_path));

        let _lock2 = FileLock::acquire(&lock_path, Some("deploy")).expect("reacquire");
    }

    #[test]
    fn second_acquire_without_release_fails() {
        let dir = tempdir().expect("tempdir");
        let lock_path = dir.path().join("repo.lock");

        let _lock = FileLock::acquire(&lock_path, None).expect("first acquire");
        let err = FileLock::acquire(&lock_path, None).unwrap_err();
        assert!(err.to_string().contains("already held"));
    }

    #[test]
    fn stale_lock_is_cleared() {
        let dir = tempdir().expect("tempdir");
        let lock_path = dir.path().join("repo.lock");

        let info = LockInfo {
            pid: 999_999,
            hostname: "stale-host".into(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
            label: None,
        };
        write_lock_info_atomic(&lock_path, &info).unwrap();

        let _lock =
            FileLock::acquire_with_timeout(&lock_path, None, Some(Duration::from_secs(60)))
                .expect("stale lock should be cleared");
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempdir().expect("tempdir");
        let lock_path = dir.path().join("repo.lock");
        {
            let _lock = FileLock::acquire(&lock_path, None).expect("acquire");
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }
}
