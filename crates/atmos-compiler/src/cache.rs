//! Load-once cache of parsed+positioned YAML files.
//!
//! Shared across stack-compile workers with a reader/writer lock, the same
//! shape `atmos-registry` uses for factory tables: concurrent stacks that
//! import the same catalog file (common — `catalog/vpc.yaml` is imported by
//! every regional stack) parse it once, not once per stack. This is the one
//! piece of state stack workers share; it is read-mostly and idempotent
//! (re-parsing the same file twice produces the same tree), so it does not
//! violate "no shared mutable state between workers" in the
//! sense that matters: workers never observe each other's in-progress
//! compile state, only a cache of immutable, already-finished parses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use atmos_yaml::LoadedDocument;

#[derive(Default)]
pub struct FileCache {
    docs: RwLock<BTreeMap<PathBuf, Arc<LoadedDocument>>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`, parsing it at most once for the lifetime of this cache.
    pub fn load(&self, path: &Path, display_name: &str) -> Result<Arc<LoadedDocument>> {
        if let Some(cached) = self.docs.read().expect("file cache lock poisoned").get(path) {
            return Ok(cached.clone());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let loaded = atmos_yaml::load(display_name, &content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let loaded = Arc::new(loaded);

        let mut docs = self.docs.write().expect("file cache lock poisoned");
        Ok(docs.entry(path.to_path_buf()).or_insert(loaded).clone())
    }

    pub fn len(&self) -> usize {
        self.docs.read().expect("file cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_load_of_the_same_path_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yaml");
        std::fs::write(&path, "vars:\n  cidr: 10.0.0.0/16\n").unwrap();

        let cache = FileCache::new();
        let first = cache.load(&path, "a.yaml").unwrap();
        assert_eq!(cache.len(), 1);
        let second = cache.load(&path, "a.yaml").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
