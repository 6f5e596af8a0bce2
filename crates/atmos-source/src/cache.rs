//! Cache CRUD (`<type> source cache {list|prune|clear|refresh}`).
//! The cache is physically one `$XDG_CACHE_HOME/atmos/sources/` tree,
//! partitioned by component-type subdirectory; this module operates on one
//! type's subtree at a time, the way the command surface scopes it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::warn;

use atmos_lock::FileLock;
use atmos_process::Cancellation;

use crate::git::GitCache;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One bare-clone cache entry discovered under a type's cache subtree.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bare_repo_dir: PathBuf,
    pub last_fetched: Option<SystemTime>,
}

impl CacheEntry {
    pub fn is_stale(&self, ttl: Duration) -> bool {
        match self.last_fetched {
            Some(t) => SystemTime::now().duration_since(t).unwrap_or_default() > ttl,
            None => true,
        }
    }
}

/// Enumerate every bare-clone (`.git` directory) cached for `component_type`.
pub fn list(component_type: &str) -> Result<Vec<CacheEntry>> {
    let root = atmos_xdg::sources_cache_dir(component_type);
    let mut entries = Vec::new();
    walk_for_bare_repos(&root, &mut entries)?;
    Ok(entries)
}

fn walk_for_bare_repos(dir: &Path, out: &mut Vec<CacheEntry>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
            let last_fetched = fs::metadata(&path).ok().and_then(|m| m.modified().ok());
            out.push(CacheEntry { bare_repo_dir: path, last_fetched });
        } else {
            walk_for_bare_repos(&path, out)?;
        }
    }
    Ok(())
}

/// Remove every cache entry older than `ttl`. Entries currently locked by
/// an in-progress fetch are skipped, not waited on: prune is a best-effort
/// maintenance command, not a vendoring step.
pub fn prune(component_type: &str, ttl: Duration) -> Result<usize> {
    let mut removed = 0;
    for entry in list(component_type)? {
        if !entry.is_stale(ttl) {
            continue;
        }
        let lock_path = entry.bare_repo_dir.with_extension("lock");
        match FileLock::acquire(lock_path, Some("prune")) {
            Ok(_lock) => {
                if let Some(repo_root) = entry.bare_repo_dir.parent() {
                    fs::remove_dir_all(repo_root).with_context(|| format!("failed to remove {}", repo_root.display()))?;
                    removed += 1;
                }
            }
            Err(err) => {
                warn!(repo = %entry.bare_repo_dir.display(), error = %err, "skipping locked cache entry during prune");
            }
        }
    }
    Ok(removed)
}

/// Remove the entire cache subtree for `component_type` unconditionally
/// (`atmos <type> source cache clear`).
pub fn clear(component_type: &str) -> Result<()> {
    let root = atmos_xdg::sources_cache_dir(component_type);
    if root.exists() {
        fs::remove_dir_all(&root).with_context(|| format!("failed to remove {}", root.display()))?;
    }
    Ok(())
}

/// Re-fetch every cached repo for `component_type` regardless of staleness
/// (`atmos <type> source cache refresh`).
pub fn refresh(component_type: &str, cancellation: &Cancellation) -> Result<usize> {
    let root = atmos_xdg::sources_cache_dir(component_type);
    let mut refreshed = 0;
    for entry in list(component_type)? {
        let repo_url = remote_url_for(&entry.bare_repo_dir)?;
        let cache = GitCache { bare_repo_dir: entry.bare_repo_dir };
        cache.ensure_cloned_and_fetched(&repo_url, None, true, cancellation)?;
        refreshed += 1;
    }
    let _ = root;
    Ok(refreshed)
}

fn remote_url_for(bare_repo_dir: &Path) -> Result<String> {
    let opts = atmos_process::RunOptions::new().in_dir(bare_repo_dir);
    let out = atmos_process::run_checked("git", &["remote", "get-url", "origin"], &opts)?;
    Ok(out.stdout.trim().to_string())
}
