//! Component-level inheritance: `metadata.inherits`
//! resolved as a second DAG over catalog keys, cycles fatal
//! (`ErrorKind::CyclicInheritance`).

use std::collections::BTreeMap;

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_merge::{MergeOptions, merge};
use atmos_provenance::{ProvenanceKey, ProvenanceKind, ProvenanceStore};
use atmos_types::Value;

use crate::graph;

/// Node identity in the inheritance DAG: a catalog key `(type, name)`.
type CatalogKey = (String, String);

/// Resolve `metadata.inherits` across every entry of `catalog`. Parents are
/// resolved in inheritance-topological order so chains (`c inherits b
/// inherits a`) propagate transitively: by the time `c` is resolved, its
/// listed parent `b` already carries everything `b` itself inherited from
/// `a` — "using the compiled catalog entries as parents" means the
/// already-inheritance-resolved entry, not the raw one.
///
/// Provenance positions recorded here are placeholders (`inherits:<type>`,
/// line 0) rather than the parent's original file position: once a
/// catalog entry is flattened out of its source file by the import-merge
/// pass (step 3), its per-leaf position is already captured in the chain
/// stamped there. What step 4 adds is *that a value came from an ancestor*,
/// not *which file the ancestor's file was*.
pub fn resolve_inheritance(
    stack: &str,
    catalog: &BTreeMap<String, BTreeMap<String, Value>>,
    store: &mut ProvenanceStore,
) -> Result<BTreeMap<String, BTreeMap<String, Value>>> {
    let nodes: Vec<CatalogKey> = catalog
        .iter()
        .flat_map(|(kind, names)| names.keys().map(move |name| (kind.clone(), name.clone())))
        .collect();

    for (kind, names) in catalog {
        for (name, raw) in names {
            for (parent_kind, parent_name) in inherits_of(raw, kind) {
                if !catalog.get(&parent_kind).is_some_and(|n| n.contains_key(&parent_name)) {
                    return Err(AtmosError::new(
                        ErrorKind::InvalidConfig,
                        format!("{kind}/{name} inherits unknown catalog entry `{parent_name}`"),
                    )
                    .with_hint("metadata.inherits entries must name another component of the same type in this stack")
                    .into());
                }
            }
        }
    }

    let edges = |key: &CatalogKey| -> Vec<CatalogKey> {
        let (kind, name) = key;
        catalog
            .get(kind)
            .and_then(|names| names.get(name))
            .map(|raw| inherits_of(raw, kind))
            .unwrap_or_default()
    };

    let order = graph::topological_sort(&nodes, edges).map_err(|cycle| cyclic_inheritance_error(&cycle.path))?;

    let mut resolved: BTreeMap<CatalogKey, Value> = BTreeMap::new();
    for key in &order {
        let (kind, name) = key;
        let raw = catalog.get(kind).and_then(|names| names.get(name)).cloned().unwrap_or_else(Value::empty_map);
        let parents = inherits_of(&raw, kind);

        let mut base = Value::empty_map();
        for parent in &parents {
            // Dangling references were already rejected above; `order`
            // guarantees every remaining parent resolves before its child.
            let parent_resolved = resolved.get(parent).cloned().expect("parent resolved before child");
            let fold_opts = MergeOptions::new(format!("inherits:{}", parent.1), 0);
            base = merge(&base, &parent_resolved, &fold_opts).value;
        }

        // A path introduced here (absent from every resolved parent) is the
        // component's own direct declaration, not an import contribution.
        let own_opts = MergeOptions::new(format!("components.{kind}.{name}"), 0)
            .with_kinds(ProvenanceKind::Inline, ProvenanceKind::Override);
        let outcome = merge(&base, &raw, &own_opts);
        for (path, entries) in outcome.provenance {
            for entry in entries {
                store.record(ProvenanceKey::new(stack, kind.clone(), name.clone(), path.clone()), entry);
            }
        }
        resolved.insert(key.clone(), outcome.value);
    }

    let mut out: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
    for ((kind, name), value) in resolved {
        out.entry(kind).or_default().insert(name, value);
    }
    Ok(out)
}

fn inherits_of(raw: &Value, own_kind: &str) -> Vec<CatalogKey> {
    raw.get_path("metadata.inherits")
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|name| (own_kind.to_string(), name.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn cyclic_inheritance_error(path: &[CatalogKey]) -> anyhow::Error {
    let rendered: Vec<String> = path.iter().map(|(kind, name)| format!("{kind}/{name}")).collect();
    AtmosError::new(ErrorKind::CyclicInheritance, format!("cyclic inheritance: {}", rendered.join(" -> "))).into()
}
