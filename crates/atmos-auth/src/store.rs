//! Credential cache persistence: one JSON file per
//! identity/provider name under `$XDG_CACHE_HOME/atmos/auth/`, guarded by
//! a `<file>.lock` file lock ("exclusive file lock around
//! read-modify-write"). Generalizes the same tmp-then-rename write idiom
//! `atmos-lock::FileLock` itself uses for its sidecar.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use atmos_lock::FileLock;

use crate::credentials::Credentials;

/// Owns the on-disk credential cache. Safe for concurrent use across
/// threads and processes: every read-modify-write is wrapped in a
/// `FileLock` ("Shared-resource policy").
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    /// Overrides the XDG-derived cache dir; used by tests.
    cache_dir: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self { cache_dir: None }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    fn path_for(&self, name: &str) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.join(format!("{name}.json")),
            None => atmos_xdg::auth_cache_file(name),
        }
    }

    /// Load the cached credential for `name`, if a file exists. Does not
    /// check expiry — that is the caller's job ("expired
    /// entries are refreshed lazily", i.e. the cache returns whatever is
    /// there and the chain walker decides whether it's still usable).
    pub fn load(&self, name: &str) -> Result<Option<Credentials>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let _lock = self.acquire_lock(&path, name)?;
        let content = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let creds = serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(creds))
    }

    /// Persist `creds` under `name`, creating parent directories (`0700`)
    /// and writing the file (`0600`) per pub fn save(&self, name: &str, creds: &Credentials) -> Result<()> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
            set_dir_mode(parent)?;
        }
        let _lock = self.acquire_lock(&path, name)?;

        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(creds).context("failed to serialize credentials")?;
        {
            let mut file = File::create(&tmp_path).with_context(|| format!("failed to create {}", tmp_path.display()))?;
            file.write_all(json.as_bytes())?;
            file.sync_all().ok();
        }
        set_file_mode(&tmp_path)?;
        fs::rename(&tmp_path, &path).with_context(|| format!("failed to rename into {}", path.display()))?;
        Ok(())
    }

    /// Remove the cached credential for `name` (`Logout`).
    pub fn clear(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        if path.exists() {
            let _lock = self.acquire_lock(&path, name)?;
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    /// Every cached name currently on disk, for `logout --all`/tag-based
    /// logout and for cache-inspection commands.
    pub fn list_cached(&self) -> Result<Vec<String>> {
        let dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => atmos_xdg::cache_dir().join("auth"),
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
            let entry = entry?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn acquire_lock(&self, path: &Path, label: &str) -> Result<FileLock> {
        let lock_path = path.with_extension(format!("{}.lock", path.extension().and_then(|e| e.to_str()).unwrap_or("json")));
        FileLock::acquire_with_timeout(lock_path, Some(label), Some(std::time::Duration::from_secs(30)))
    }
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new().with_cache_dir(dir.path());
        let creds = Credentials::new("deploy", "fp1").with_expires_at(Utc::now() + chrono::Duration::hours(1));

        store.save("deploy", &creds).unwrap();
        let loaded = store.load("deploy").unwrap().expect("present");
        assert_eq!(loaded.identity_name, "deploy");
        assert_eq!(loaded.principal_fingerprint, "fp1");
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new().with_cache_dir(dir.path());
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn clear_removes_the_cached_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new().with_cache_dir(dir.path());
        store.save("deploy", &Credentials::new("deploy", "fp")).unwrap();
        store.clear("deploy").unwrap();
        assert!(store.load("deploy").unwrap().is_none());
    }

    #[test]
    fn list_cached_returns_sorted_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new().with_cache_dir(dir.path());
        store.save("zeta", &Credentials::new("zeta", "fp")).unwrap();
        store.save("alpha", &Credentials::new("alpha", "fp")).unwrap();
        assert_eq!(store.list_cached().unwrap(), vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_has_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new().with_cache_dir(dir.path());
        store.save("deploy", &Credentials::new("deploy", "fp")).unwrap();
        let mode = fs::metadata(dir.path().join("deploy.json")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
