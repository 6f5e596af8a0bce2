//! git-worktree + sparse-checkout vendoring strategy, preferred
//! for git URLs. Grounded directly on the teacher's `shipper-git` idiom of
//! shelling out to the real `git` binary via `std::process::Command`
//! rather than a bindings crate (`git2`), generalized through
//! `atmos-process::run_checked` so `git fetch`/`worktree add` honor
//! cancellation the same way every other subprocess in this workspace does.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use atmos_errors::{AtmosError, ErrorKind};
use atmos_lock::FileLock;
use atmos_process::{Cancellation, RunOptions, run_checked};

/// A bare clone cached under `$XDG_CACHE_HOME/atmos/sources/<type>/git/...`,
/// shared across worktrees for every ref ever requested of this repo.
pub struct GitCache {
    pub bare_repo_dir: PathBuf,
}

impl GitCache {
    pub fn new(cache_root: &Path, repo_url: &str) -> Self {
        Self { bare_repo_dir: cache_root.join(sanitize_repo_path(repo_url)).join(".git") }
    }

    /// Ensure the bare clone exists, fetching if it's missing, stale past
    /// `ttl`, or `force` is set ("Stale-cache detection uses a
    /// configurable TTL ... plus explicit `--no-cache`"; "a
    /// per-repo file lock protects `git fetch` and `git worktree add`;
    /// reads of an existing worktree are lock-free").
    pub fn ensure_cloned_and_fetched(
        &self,
        repo_url: &str,
        ttl: Option<std::time::Duration>,
        force: bool,
        cancellation: &Cancellation,
    ) -> Result<()> {
        let _lock = self.acquire_lock(repo_url)?;

        if !self.bare_repo_dir.exists() {
            if let Some(parent) = self.bare_repo_dir.parent() {
                std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let opts = RunOptions::new().with_cancellation(cancellation.clone());
            run_checked("git", &["clone", "--bare", repo_url, self.bare_repo_dir.to_str().unwrap_or_default()], &opts)
                .map_err(|err| wrap_provision_error(err, repo_url, &self.bare_repo_dir))?;
            return Ok(());
        }

        if !force && !self.is_stale(ttl) {
            return Ok(());
        }

        let opts = RunOptions::new().in_dir(&self.bare_repo_dir).with_cancellation(cancellation.clone());
        run_checked("git", &["fetch", "--all", "--tags"], &opts)
            .map_err(|err| wrap_provision_error(err, repo_url, &self.bare_repo_dir))?;
        Ok(())
    }

    fn is_stale(&self, ttl: Option<std::time::Duration>) -> bool {
        let Some(ttl) = ttl else { return true };
        match std::fs::metadata(&self.bare_repo_dir).and_then(|m| m.modified()) {
            Ok(modified) => std::time::SystemTime::now().duration_since(modified).unwrap_or_default() > ttl,
            Err(_) => true,
        }
    }

    /// `git worktree add --no-checkout` at `git_ref`, sparse-checkout the
    /// cone `subpath`, then check out and copy the cone into `target`.
    pub fn checkout_subpath(
        &self,
        git_ref: &str,
        subpath: &str,
        worktree_dir: &Path,
        cancellation: &Cancellation,
    ) -> Result<PathBuf> {
        if worktree_dir.exists() {
            std::fs::remove_dir_all(worktree_dir).with_context(|| format!("failed to clear stale worktree {}", worktree_dir.display()))?;
        }
        if let Some(parent) = worktree_dir.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let repo_opts = RunOptions::new().in_dir(&self.bare_repo_dir).with_cancellation(cancellation.clone());
        run_checked(
            "git",
            &["worktree", "add", "--no-checkout", "--detach", worktree_dir.to_str().unwrap_or_default(), git_ref],
            &repo_opts,
        )
        .map_err(|err| wrap_provision_error(err, git_ref, worktree_dir))?;

        let worktree_opts = RunOptions::new().in_dir(worktree_dir).with_cancellation(cancellation.clone());
        run_checked("git", &["sparse-checkout", "init", "--cone"], &worktree_opts)
            .map_err(|err| wrap_provision_error(err, git_ref, worktree_dir))?;
        run_checked("git", &["sparse-checkout", "set", subpath], &worktree_opts)
            .map_err(|err| wrap_provision_error(err, git_ref, worktree_dir))?;
        run_checked("git", &["checkout", git_ref], &worktree_opts)
            .map_err(|err| wrap_provision_error(err, git_ref, worktree_dir))?;

        Ok(worktree_dir.join(subpath))
    }

    /// Detach and remove a worktree once its subpath has been copied out
    /// (the worktree itself is scratch space, not part of the cache).
    pub fn remove_worktree(&self, worktree_dir: &Path, cancellation: &Cancellation) -> Result<()> {
        let opts = RunOptions::new().in_dir(&self.bare_repo_dir).with_cancellation(cancellation.clone());
        let _ = run_checked("git", &["worktree", "remove", "--force", worktree_dir.to_str().unwrap_or_default()], &opts);
        if worktree_dir.exists() {
            std::fs::remove_dir_all(worktree_dir).ok();
        }
        Ok(())
    }

    fn acquire_lock(&self, repo_url: &str) -> Result<FileLock> {
        let lock_path = self.bare_repo_dir.with_extension("lock");
        FileLock::acquire_with_timeout(lock_path, Some(repo_url), Some(std::time::Duration::from_secs(120)))
    }
}

fn wrap_provision_error(cause: anyhow::Error, uri: &str, target: impl AsRef<Path>) -> anyhow::Error {
    AtmosError::new(ErrorKind::SourceProvision, format!("failed to vendor `{uri}`"))
        .with_hint("check network access, authentication, and that the ref/subpath exist in the repo")
        .with_context("uri", uri)
        .with_context("target", target.as_ref().display())
        .with_cause(cause)
        .into()
}

/// Turn a repo URL into a filesystem-safe cache subdirectory, stripping the
/// scheme and any `.git` suffix so `https://github.com/acme/modules.git`
/// and `git@github.com:acme/modules.git` land under the same cache entry
/// style as example (`github.com/acme/modules`).
fn sanitize_repo_path(repo_url: &str) -> String {
    let stripped = repo_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("ssh://")
        .trim_start_matches("git://");
    let stripped = stripped.strip_prefix("git@").unwrap_or(stripped).replacen(':', "/", 1);
    stripped.strip_suffix(".git").unwrap_or(&stripped).to_string()
}
