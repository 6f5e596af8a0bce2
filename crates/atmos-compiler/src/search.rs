//! Resolves a stack name or an `import:` entry against the configured
//! stack-search paths ("Import": "a named reference resolved
//! against stack search paths").

use std::path::{Path, PathBuf};

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};

/// An ordered list of directories searched, in order, for a stack or import
/// name. The first match wins, mirroring the teacher's layered
/// configuration-discovery precedent (`shipper`'s
/// `load_from_file`/`load_from_workspace` pair: explicit path first, then a
/// conventional fallback).
#[derive(Debug, Clone)]
pub struct StackSearchPaths {
    roots: Vec<PathBuf>,
}

impl StackSearchPaths {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { roots: roots.into_iter().collect() }
    }

    /// Resolve a bare name (no extension) to a file on disk, trying
    /// `<root>/<name>.yaml` then `<root>/<name>.yml` for every root in
    /// order.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        for root in &self.roots {
            for ext in ["yaml", "yml"] {
                let candidate = root.join(format!("{name}.{ext}"));
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
            // Imports may already carry an extension.
            let candidate = root.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(AtmosError::new(ErrorKind::NotFound, format!("stack or import not found: {name}"))
            .with_hint(format!(
                "searched: {}",
                self.roots.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
            ))
            .into())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Render a path relative to the first search root that contains it, for
/// human-readable provenance (`stacks/prod.yaml` rather than an absolute
/// path that varies by machine).
pub fn display_path(search: &StackSearchPaths, path: &Path) -> String {
    for root in search.roots() {
        if let Ok(rel) = path.strip_prefix(root) {
            return rel.display().to_string();
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_yaml_before_yml_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prod.yaml"), "vars: {}\n").unwrap();
        let search = StackSearchPaths::new([dir.path().to_path_buf()]);
        let resolved = search.resolve("prod").unwrap();
        assert_eq!(resolved, dir.path().join("prod.yaml"));
    }

    #[test]
    fn falls_through_to_second_root() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("base.yaml"), "vars: {}\n").unwrap();
        let search = StackSearchPaths::new([first.path().to_path_buf(), second.path().to_path_buf()]);
        let resolved = search.resolve("base").unwrap();
        assert_eq!(resolved, second.path().join("base.yaml"));
    }

    #[test]
    fn missing_name_errors_with_searched_roots_hint() {
        let dir = tempfile::tempdir().unwrap();
        let search = StackSearchPaths::new([dir.path().to_path_buf()]);
        let err = search.resolve("nope").unwrap_err();
        let atmos_err = AtmosError::downcast(&err).unwrap();
        assert_eq!(atmos_err.kind, ErrorKind::NotFound);
    }
}
