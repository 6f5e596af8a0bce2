//! The provisioner entry point: given a component's
//! `metadata.source`, ensure its source tree exists on disk at the
//! resolved target path, vendoring it if necessary.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use atmos_errors::{AtmosError, ErrorKind};
use atmos_process::Cancellation;
use atmos_types::{SourceSpec, TargetPath};

use crate::cache::DEFAULT_TTL;
use crate::fallback;
use crate::git::GitCache;
use crate::target::{resolve_target_path, skip_vendoring};

/// Per-call knobs mirroring the CLI flags named in #[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub force: bool,
    pub no_cache: bool,
    pub ttl: Duration,
    pub cancellation: Cancellation,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self { force: false, no_cache: false, ttl: DEFAULT_TTL, cancellation: Cancellation::default() }
    }
}

/// Whether the last provision actually touched disk, or found the target
/// already present and up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Vendored,
    AlreadyPresent,
}

/// Ensure `component_name`'s source tree exists at the resolved target
/// path, vendoring via git-worktree (git URLs) or the go-getter fallback
/// (everything else).
pub fn ensure_source(
    component_type: &str,
    component_name: &str,
    source: &SourceSpec,
    working_directory: Option<&Path>,
    base_path: &Path,
    opts: &ProvisionOptions,
) -> Result<(TargetPath, ProvisionOutcome)> {
    let target = resolve_target_path(working_directory, base_path, component_name);

    if !opts.force && skip_vendoring(&target) {
        return Ok((target, ProvisionOutcome::AlreadyPresent));
    }

    if !opts.force && target.path.exists() && matches_version_marker(&target.path, source.version()) {
        return Ok((target, ProvisionOutcome::AlreadyPresent));
    }

    vendor_into(source, &target.path, component_type, opts).with_context(|| format!("provisioning source for {component_type}/{component_name}"))?;
    write_version_marker(&target.path, source.version())?;

    Ok((target, ProvisionOutcome::Vendored))
}

fn vendor_into(source: &SourceSpec, target: &Path, component_type: &str, opts: &ProvisionOptions) -> Result<()> {
    let tmp_target = target.with_extension("tmp");
    if tmp_target.exists() {
        std::fs::remove_dir_all(&tmp_target).ok();
    }

    if is_git_uri(source.uri()) {
        vendor_git(source, &tmp_target, component_type, opts)?;
    } else {
        fallback::fetch(source.uri(), &tmp_target)?;
    }

    if target.exists() {
        std::fs::remove_dir_all(target).with_context(|| format!("failed to clear existing target {}", target.display()))?;
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::rename(&tmp_target, target).with_context(|| format!("failed to finalize vendored source at {}", target.display()))?;
    Ok(())
}

fn vendor_git(source: &SourceSpec, tmp_target: &Path, component_type: &str, opts: &ProvisionOptions) -> Result<()> {
    if !atmos_process::command_exists("git") {
        return Err(AtmosError::new(ErrorKind::SourceProvision, "git binary not found on PATH")
            .with_hint("install git or use a non-git source URI")
            .with_context("uri", source.uri())
            .into());
    }

    let (repo_url, subpath) = split_git_uri(source.uri());
    let git_ref = source.version().unwrap_or("HEAD");

    let cache_root = atmos_xdg::sources_cache_dir(component_type);
    let cache = GitCache::new(&cache_root, &repo_url);

    cache.ensure_cloned_and_fetched(&repo_url, Some(opts.ttl), opts.no_cache, &opts.cancellation)?;

    let worktree_dir = cache_root.join("worktrees").join(sanitize_ref(git_ref));
    let checked_out = cache
        .checkout_subpath(git_ref, &subpath, &worktree_dir, &opts.cancellation)
        .map_err(|err| wrap_provision_error(err, source.uri(), tmp_target))?;

    crate::copy::copy_tree(&checked_out, tmp_target)?;
    cache.remove_worktree(&worktree_dir, &opts.cancellation)?;
    Ok(())
}

fn wrap_provision_error(cause: anyhow::Error, uri: &str, target: &Path) -> anyhow::Error {
    if AtmosError::downcast(&cause).is_some() {
        return cause;
    }
    AtmosError::new(ErrorKind::SourceProvision, format!("failed to vendor `{uri}`"))
        .with_context("uri", uri)
        .with_context("target", target.display())
        .with_cause(cause)
        .into()
}

fn is_git_uri(uri: &str) -> bool {
    uri.ends_with(".git")
        || uri.contains(".git//")
        || uri.starts_with("git@")
        || uri.starts_with("git::")
        || uri.contains("github.com")
        || uri.contains("gitlab.com")
}

/// Split a go-getter-style `<repo>//<subpath>?ref=<version>` URI into the
/// repo URL and the sparse-checkout subpath. The `ref=` query component, if
/// present, is stripped here since `SourceSpec::version()` already carries
/// it for the detailed map form (example:
/// `github.com/acme/modules//vpc?ref=v1.2.3`).
fn split_git_uri(uri: &str) -> (String, String) {
    let without_query = uri.split('?').next().unwrap_or(uri);
    let without_scheme = without_query.trim_start_matches("git::");
    match without_scheme.split_once("//") {
        Some((repo, subpath)) if !repo.is_empty() && !subpath.is_empty() => {
            let repo = if repo.contains("://") || repo.starts_with("git@") { repo.to_string() } else { format!("https://{repo}") };
            (repo, subpath.to_string())
        }
        _ => {
            let repo = if without_scheme.contains("://") || without_scheme.starts_with("git@") {
                without_scheme.to_string()
            } else {
                format!("https://{without_scheme}")
            };
            (repo, String::new())
        }
    }
}

fn sanitize_ref(git_ref: &str) -> String {
    git_ref.chars().map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '-' }).collect()
}

const VERSION_MARKER_FILE: &str = ".atmos-source-version";

fn matches_version_marker(target: &Path, version: Option<&str>) -> bool {
    let marker = target.join(VERSION_MARKER_FILE);
    match (std::fs::read_to_string(&marker), version) {
        (Ok(recorded), Some(wanted)) => recorded.trim() == wanted,
        (Ok(recorded), None) => recorded.trim().is_empty(),
        (Err(_), _) => false,
    }
}

fn write_version_marker(target: &Path, version: Option<&str>) -> Result<()> {
    let marker = target.join(VERSION_MARKER_FILE);
    std::fs::write(&marker, version.unwrap_or_default())
        .with_context(|| format!("failed to write {}", marker.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_git_uri_with_subpath_and_ref() {
        let (repo, subpath) = split_git_uri("github.com/acme/modules//vpc?ref=v1.2.3");
        assert_eq!(repo, "https://github.com/acme/modules");
        assert_eq!(subpath, "vpc");
    }

    #[test]
    fn split_git_uri_without_subpath() {
        let (repo, subpath) = split_git_uri("https://github.com/acme/modules.git");
        assert_eq!(repo, "https://github.com/acme/modules.git");
        assert_eq!(subpath, "");
    }

    #[test]
    fn is_git_uri_detects_common_hosts() {
        assert!(is_git_uri("github.com/acme/modules//vpc"));
        assert!(is_git_uri("git@gitlab.com:acme/modules.git"));
        assert!(!is_git_uri("https://example.com/archive.zip"));
    }

    #[test]
    fn ensure_source_skips_vendoring_for_existing_local_component() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("components/terraform");
        std::fs::create_dir_all(base.join("vpc")).unwrap();

        let source = SourceSpec::Uri("https://example.com/local-source.zip".to_string());
        let opts = ProvisionOptions::default();
        let (target, outcome) = ensure_source("terraform", "vpc", &source, None, &base, &opts).unwrap();
        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert_eq!(target.path, base.join("vpc"));
    }

    #[test]
    fn ensure_source_vendors_local_fallback_source() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        std::fs::write(upstream.join("main.tf"), b"resource {}").unwrap();

        let base = dir.path().join("components/terraform");
        let source = SourceSpec::Uri(upstream.to_str().unwrap().to_string());
        let opts = ProvisionOptions::default();
        let (target, outcome) = ensure_source("terraform", "vpc", &source, None, &base, &opts).unwrap();
        assert_eq!(outcome, ProvisionOutcome::Vendored);
        assert!(target.path.join("main.tf").exists());
    }

    #[test]
    fn ensure_source_is_idempotent_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        std::fs::write(upstream.join("main.tf"), b"resource {}").unwrap();

        let base = dir.path().join("components/terraform");
        let source = SourceSpec::Uri(upstream.to_str().unwrap().to_string());
        let opts = ProvisionOptions::default();
        ensure_source("terraform", "vpc", &source, None, &base, &opts).unwrap();

        std::fs::remove_file(upstream.join("main.tf")).unwrap();
        let (_target, outcome) = ensure_source("terraform", "vpc", &source, None, &base, &opts).unwrap();
        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
    }

    #[test]
    fn working_directory_override_wins_as_target_but_still_vendors() {
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        std::fs::create_dir_all(&upstream).unwrap();
        std::fs::write(upstream.join("main.tf"), b"resource {}").unwrap();

        let workdir = dir.path().join("custom");
        let base = dir.path().join("components/terraform");
        let source = SourceSpec::Uri(upstream.to_str().unwrap().to_string());
        let opts = ProvisionOptions::default();

        let (target, outcome) = ensure_source("terraform", "vpc", &source, Some(&workdir), &base, &opts).unwrap();
        assert_eq!(outcome, ProvisionOutcome::Vendored);
        assert_eq!(target.path, workdir);
        assert!(workdir.join("main.tf").exists());
    }
}
