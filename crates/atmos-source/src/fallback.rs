//! go-getter-style fallback vendoring for non-git URIs ("for
//! S3/OCI/HTTP/local: delegate to a URL-driven fetcher"). HTTP fetch uses
//! `reqwest`'s blocking client, the same crate and feature set the teacher
//! reaches for in `shipper-webhook` — this workspace otherwise stays
//! synchronous end to end, so the blocking client (not an async runtime)
//! is the idiomatic fit.
//!
//! S3/OCI are named as fallback targets but are genuinely out of scope for
//! a core crate with no AWS/OCI SDK dependency already in the stack —
//! deliberately left as contracts the core consumes rather than
//! implements; `local` and plain `http(s)` are implemented directly since
//! they need nothing beyond what's already here.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use atmos_errors::{AtmosError, ErrorKind};

use crate::copy::copy_tree;

/// A non-git source URI, classified by scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackScheme {
    Http,
    Local,
    Unsupported,
}

pub fn classify(uri: &str) -> FallbackScheme {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        FallbackScheme::Http
    } else if uri.starts_with("file://") || uri.starts_with('.') || uri.starts_with('/') {
        FallbackScheme::Local
    } else {
        FallbackScheme::Unsupported
    }
}

/// Vendor `uri` into `target`, dispatching on scheme. Archives (`.zip`,
/// `.tar.gz`) are out of scope here: `uri` is expected to reference a
/// directory (local) or a single already-extracted artifact served over
/// HTTP, matching the subset of go-getter's surface this workspace needs.
pub fn fetch(uri: &str, target: &Path) -> Result<()> {
    match classify(uri) {
        FallbackScheme::Local => fetch_local(uri, target),
        FallbackScheme::Http => fetch_http(uri, target),
        FallbackScheme::Unsupported => Err(AtmosError::new(ErrorKind::SourceProvision, format!("unsupported source scheme: {uri}"))
            .with_hint("supported fallback schemes are local paths and http(s); git URLs use the git-worktree strategy")
            .with_context("uri", uri)
            .into()),
    }
}

fn fetch_local(uri: &str, target: &Path) -> Result<()> {
    let src = uri.strip_prefix("file://").unwrap_or(uri);
    let src = Path::new(src);
    if !src.is_dir() {
        return Err(AtmosError::new(ErrorKind::SourceNotFound, format!("local source path does not exist: {}", src.display()))
            .with_context("uri", uri)
            .into());
    }
    copy_tree(src, target)
}

fn fetch_http(uri: &str, target: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("failed to build http client")?;

    let response = client
        .get(uri)
        .send()
        .map_err(|err| wrap_network_error(err, uri))?
        .error_for_status()
        .map_err(|err| wrap_network_error(err, uri))?;

    let bytes = response.bytes().map_err(|err| wrap_network_error(err, uri))?;

    fs::create_dir_all(target).with_context(|| format!("failed to create {}", target.display()))?;
    let file_name = uri.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("source");
    let mut file = fs::File::create(target.join(file_name)).with_context(|| format!("failed to create {}", target.join(file_name).display()))?;
    file.write_all(&bytes)?;
    Ok(())
}

fn wrap_network_error(cause: reqwest::Error, uri: &str) -> anyhow::Error {
    AtmosError::new(ErrorKind::Network, format!("failed to fetch `{uri}`"))
        .with_hint("check network access and that the URL is reachable")
        .with_context("uri", uri)
        .with_cause(cause.into())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_schemes() {
        assert_eq!(classify("https://example.com/a"), FallbackScheme::Http);
        assert_eq!(classify("./local/path"), FallbackScheme::Local);
        assert_eq!(classify("/abs/path"), FallbackScheme::Local);
        assert_eq!(classify("s3::https://bucket/key"), FallbackScheme::Unsupported);
    }

    #[test]
    fn fetch_local_copies_directory_tree() {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("main.tf"), b"resource {}").unwrap();
        let target = tempfile::tempdir().unwrap();

        fetch(src.path().to_str().unwrap(), target.path()).unwrap();
        assert!(target.path().join("main.tf").exists());
    }

    #[test]
    fn fetch_local_missing_path_is_source_not_found() {
        let target = tempfile::tempdir().unwrap();
        let err = fetch("/definitely/does/not/exist", target.path()).unwrap_err();
        assert_eq!(AtmosError::downcast(&err).unwrap().kind, ErrorKind::SourceNotFound);
    }

    #[test]
    fn unsupported_scheme_is_source_provision_error() {
        let target = tempfile::tempdir().unwrap();
        let err = fetch("s3::https://bucket/key", target.path()).unwrap_err();
        assert_eq!(AtmosError::downcast(&err).unwrap().kind, ErrorKind::SourceProvision);
    }
}
