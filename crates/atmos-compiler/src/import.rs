//! Import DAG construction and merge-order resolution (step 1: imports
//! form a DAG per stack; cycles are fatal).

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::Value;
use atmos_yaml::LoadedDocument;

use crate::cache::FileCache;
use crate::graph;
use crate::search::{StackSearchPaths, display_path};

/// One file taking part in a stack's merge, already in merge order
/// (imports before the file that imports them; the stack's own root file
/// last, so its declarations win).
pub struct MergeLayer {
    pub display_name: String,
    pub doc: Arc<LoadedDocument>,
    pub depth: u32,
    pub is_root: bool,
}

/// Resolve `stack_file`'s import DAG and return its merge order. Every
/// unique file is parsed at most once (via `cache`); a file that
/// (transitively) imports itself fails with `ErrorKind::CyclicImport`.
pub fn merge_order(stack_file: &Path, search: &StackSearchPaths, cache: &FileCache) -> Result<Vec<MergeLayer>> {
    let mut edges: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut visiting: Vec<PathBuf> = Vec::new();
    let mut discovered: BTreeSet<PathBuf> = BTreeSet::new();

    discover(stack_file, search, cache, &mut edges, &mut visiting, &mut discovered)?;

    let nodes: Vec<PathBuf> = discovered.into_iter().collect();
    let order = graph::topological_sort(&nodes, |n| edges.get(n).cloned().unwrap_or_default())
        .map_err(|cycle| cyclic_import_error(search, &cycle.path))?;
    let depth = graph::depths(&nodes, |n| edges.get(n).cloned().unwrap_or_default());

    order
        .into_iter()
        .map(|path| {
            let doc = cache.load(&path, &display_path(search, &path))?;
            Ok(MergeLayer {
                display_name: display_path(search, &path),
                depth: depth.get(&path).copied().unwrap_or(0),
                is_root: path == stack_file,
                doc,
            })
        })
        .collect()
}

fn discover(
    path: &Path,
    search: &StackSearchPaths,
    cache: &FileCache,
    edges: &mut BTreeMap<PathBuf, Vec<PathBuf>>,
    visiting: &mut Vec<PathBuf>,
    discovered: &mut BTreeSet<PathBuf>,
) -> Result<()> {
    if edges.contains_key(path) {
        return Ok(());
    }
    if visiting.iter().any(|p| p == path) {
        return Err(cyclic_import_error(search, &path_cycle(visiting, path)));
    }

    visiting.push(path.to_path_buf());
    discovered.insert(path.to_path_buf());

    let doc = cache.load(path, &display_path(search, path))?;
    let imports = import_names(&doc.value);
    let mut children = Vec::with_capacity(imports.len());
    for name in imports {
        let child = search
            .resolve(&name)
            .with_context(|| format!("import `{name}` referenced from {}", display_path(search, path)))?;
        children.push(child.clone());
        discover(&child, search, cache, edges, visiting, discovered)?;
    }

    edges.insert(path.to_path_buf(), children);
    visiting.pop();
    Ok(())
}

fn path_cycle(visiting: &[PathBuf], repeated: &Path) -> Vec<PathBuf> {
    let start = visiting.iter().position(|p| p == repeated).unwrap_or(0);
    let mut cycle = visiting[start..].to_vec();
    cycle.push(repeated.to_path_buf());
    cycle
}

fn cyclic_import_error(search: &StackSearchPaths, path: &[PathBuf]) -> anyhow::Error {
    let rendered: Vec<String> = path.iter().map(|p| display_path(search, p)).collect();
    AtmosError::new(ErrorKind::CyclicImport, format!("cyclic import: {}", rendered.join(" -> "))).into()
}

fn import_names(doc: &Value) -> Vec<String> {
    doc.get_path("import")
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn merge_order_puts_imports_before_the_stack_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "catalog.yaml", "vars:\n  region: us-east-2\n");
        write(dir.path(), "prod.yaml", "import:\n  - catalog\nvars:\n  stage: prod\n");

        let search = StackSearchPaths::new([dir.path().to_path_buf()]);
        let cache = FileCache::new();
        let stack_file = search.resolve("prod").unwrap();

        let layers = merge_order(&stack_file, &search, &cache).unwrap();
        let names: Vec<&str> = layers.iter().map(|l| l.display_name.as_str()).collect();
        assert_eq!(names, vec!["catalog.yaml", "prod.yaml"]);
        assert!(!layers[0].is_root);
        assert!(layers[1].is_root);
    }

    #[test]
    fn diamond_import_is_loaded_once_via_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.yaml", "vars:\n  region: us-east-2\n");
        write(dir.path(), "mixin-a.yaml", "import:\n  - base\n");
        write(dir.path(), "mixin-b.yaml", "import:\n  - base\n");
        write(dir.path(), "prod.yaml", "import:\n  - mixin-a\n  - mixin-b\n");

        let search = StackSearchPaths::new([dir.path().to_path_buf()]);
        let cache = FileCache::new();
        let stack_file = search.resolve("prod").unwrap();

        let layers = merge_order(&stack_file, &search, &cache).unwrap();
        assert_eq!(layers.len(), 4);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn self_referential_import_chain_is_a_cyclic_import_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "import:\n  - b\n");
        write(dir.path(), "b.yaml", "import:\n  - a\n");

        let search = StackSearchPaths::new([dir.path().to_path_buf()]);
        let cache = FileCache::new();
        let stack_file = search.resolve("a").unwrap();

        let err = merge_order(&stack_file, &search, &cache).unwrap_err();
        let atmos_err = AtmosError::downcast(&err).expect("sentinel");
        assert_eq!(atmos_err.kind, ErrorKind::CyclicImport);
    }

    #[test]
    fn missing_import_is_reported_with_the_referencing_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prod.yaml", "import:\n  - does-not-exist\n");

        let search = StackSearchPaths::new([dir.path().to_path_buf()]);
        let cache = FileCache::new();
        let stack_file = search.resolve("prod").unwrap();

        let err = merge_order(&stack_file, &search, &cache).unwrap_err();
        assert!(format!("{err:#}").contains("does-not-exist"));
    }
}
