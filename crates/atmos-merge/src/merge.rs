use std::collections::BTreeMap;

use atmos_provenance::{Position, ProvenanceEntry, ProvenanceKind};
use atmos_types::Value;

use crate::policy::{ListPolicies, ListPolicy};

/// Everything the merge engine needs beyond the two trees: list-merge
/// policies, where incoming leaves live in their source file (for
/// provenance), how deep in the import chain this merge is, and which
/// provenance kinds to stamp for newly-introduced vs. already-present
/// paths. The compiler supplies `new_kind = Inline` for a stack's own
/// top-level content and `Import`/`Override` for subsequent import layers,
/// matching the five-kind taxonomy in while this engine only ever
/// reasons about "was this path already here".
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub list_policies: ListPolicies,
    pub src_positions: BTreeMap<String, Position>,
    pub src_file: String,
    pub depth: u32,
    pub new_kind: ProvenanceKind,
    pub override_kind: ProvenanceKind,
}

impl MergeOptions {
    pub fn new(src_file: impl Into<String>, depth: u32) -> Self {
        Self {
            list_policies: ListPolicies::new(),
            src_positions: BTreeMap::new(),
            src_file: src_file.into(),
            depth,
            new_kind: ProvenanceKind::Import,
            override_kind: ProvenanceKind::Override,
        }
    }

    pub fn with_positions(mut self, positions: BTreeMap<String, Position>) -> Self {
        self.src_positions = positions;
        self
    }

    pub fn with_list_policies(mut self, policies: ListPolicies) -> Self {
        self.list_policies = policies;
        self
    }

    pub fn with_kinds(mut self, new_kind: ProvenanceKind, override_kind: ProvenanceKind) -> Self {
        self.new_kind = new_kind;
        self.override_kind = override_kind;
        self
    }

    fn position_for(&self, path: &str) -> Position {
        self.src_positions
            .get(path)
            .cloned()
            .unwrap_or_else(|| Position::new(self.src_file.clone(), 0, 0))
    }
}

/// Per-JSONPath provenance produced by one merge call. The compiler
/// re-keys these into a full `ProvenanceKey` (stack, type, name, path)
/// once it knows which component a path belongs to.
pub type PathProvenance = BTreeMap<String, Vec<ProvenanceEntry>>;

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub value: Value,
    pub provenance: PathProvenance,
}

/// Deep-merge `src` into `dest`, producing a new tree. Deterministic: the
/// result depends only on `(dest, src, options)`, never on map iteration
/// order, because `Value::Map` is a `BTreeMap` and every recursive walk
/// below iterates it in key order.
pub fn merge(dest: &Value, src: &Value, opts: &MergeOptions) -> MergeOutcome {
    let mut provenance = PathProvenance::new();
    let value = merge_at(dest, src, "", opts, &mut provenance);
    MergeOutcome { value, provenance }
}

fn merge_at(
    dest: &Value,
    src: &Value,
    path: &str,
    opts: &MergeOptions,
    provenance: &mut PathProvenance,
) -> Value {
    match (dest, src) {
        (Value::Map(dest_map), Value::Map(src_map)) => {
            let mut result = dest_map.clone();
            for (key, src_val) in src_map {
                let child_path = join_key(path, key);
                match dest_map.get(key) {
                    Some(dest_val) => {
                        let merged = merge_at(dest_val, src_val, &child_path, opts, provenance);
                        result.insert(key.clone(), merged);
                    }
                    None => {
                        let introduced = stamp_new_subtree(src_val, &child_path, opts, provenance);
                        result.insert(key.clone(), introduced);
                    }
                }
            }
            Value::Map(result)
        }
        (Value::List(dest_list), Value::List(src_list)) => {
            merge_lists(dest_list, src_list, path, opts, provenance)
        }
        _ => {
            // Scalars, type mismatches, or a container replacing a scalar
            // (and vice versa): later wins, wholesale.
            record(provenance, path, opts.override_kind, opts);
            src.clone()
        }
    }
}

fn merge_lists(
    dest_list: &[Value],
    src_list: &[Value],
    path: &str,
    opts: &MergeOptions,
    provenance: &mut PathProvenance,
) -> Value {
    match opts.list_policies.for_path(path) {
        ListPolicy::Replace => {
            for (i, _) in src_list.iter().enumerate() {
                let child_path = format!("{path}[{i}]");
                record(provenance, &child_path, opts.override_kind, opts);
            }
            Value::List(src_list.to_vec())
        }
        ListPolicy::Append => {
            let mut result = dest_list.to_vec();
            let base = result.len();
            for (i, item) in src_list.iter().enumerate() {
                let child_path = format!("{path}[{}]", base + i);
                let stamped = stamp_new_subtree(item, &child_path, opts, provenance);
                result.push(stamped);
            }
            Value::List(result)
        }
        ListPolicy::MergeByKey { key_field } => {
            merge_list_by_key(dest_list, src_list, &key_field, path, opts, provenance)
        }
    }
}

fn merge_list_by_key(
    dest_list: &[Value],
    src_list: &[Value],
    key_field: &str,
    path: &str,
    opts: &MergeOptions,
    provenance: &mut PathProvenance,
) -> Value {
    let mut result = dest_list.to_vec();
    for src_item in src_list {
        let src_key = src_item.as_map().and_then(|m| m.get(key_field));
        let existing_index = src_key.and_then(|key| {
            result.iter().position(|d| {
                d.as_map().and_then(|m| m.get(key_field)) == Some(key)
            })
        });

        match existing_index {
            Some(idx) => {
                let child_path = format!("{path}[{idx}]");
                result[idx] = merge_at(&result[idx], src_item, &child_path, opts, provenance);
            }
            None => {
                let child_path = format!("{path}[{}]", result.len());
                result.push(stamp_new_subtree(src_item, &child_path, opts, provenance));
            }
        }
    }
    Value::List(result)
}

/// Record provenance for every leaf of a subtree being introduced fresh
/// (the path, or this index, did not exist in `dest` before). Returns a
/// clone of `src` — no transformation needed, just provenance bookkeeping.
fn stamp_new_subtree(
    src: &Value,
    path: &str,
    opts: &MergeOptions,
    provenance: &mut PathProvenance,
) -> Value {
    match src {
        Value::Map(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                let child_path = join_key(path, k);
                out.insert(k.clone(), stamp_new_subtree(v, &child_path, opts, provenance));
            }
            Value::Map(out)
        }
        Value::List(items) => {
            let out = items
                .iter()
                .enumerate()
                .map(|(i, v)| stamp_new_subtree(v, &format!("{path}[{i}]"), opts, provenance))
                .collect();
            Value::List(out)
        }
        leaf => {
            record(provenance, path, opts.new_kind, opts);
            leaf.clone()
        }
    }
}

fn record(provenance: &mut PathProvenance, path: &str, kind: ProvenanceKind, opts: &MergeOptions) {
    if path.is_empty() {
        return;
    }
    let entry = ProvenanceEntry::new(opts.position_for(path), kind, opts.depth);
    provenance.entry(path.to_string()).or_default().push(entry);
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_types::Number;
    use proptest::prelude::*;

    fn leaf_map(pairs: &[(&str, Value)]) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Value::Map(map)
    }

    #[test]
    fn scalar_override_records_override_kind_at_existing_path() {
        let dest = leaf_map(&[("cidr", Value::String("10.0.0.0/16".into()))]);
        let src = leaf_map(&[("cidr", Value::String("10.100.0.0/16".into()))]);
        let opts = MergeOptions::new("stacks/prod.yaml", 1);

        let outcome = merge(&dest, &src, &opts);
        assert_eq!(
            outcome.value.get_path("cidr"),
            Some(&Value::String("10.100.0.0/16".into()))
        );
        let chain = outcome.provenance.get("cidr").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].kind, ProvenanceKind::Override);
    }

    #[test]
    fn new_key_records_new_kind() {
        let dest = leaf_map(&[]);
        let src = leaf_map(&[("region", Value::String("us-east-2".into()))]);
        let opts = MergeOptions::new("catalog/base.yaml", 2);

        let outcome = merge(&dest, &src, &opts);
        let chain = outcome.provenance.get("region").unwrap();
        assert_eq!(chain[0].kind, ProvenanceKind::Import);
        assert_eq!(chain[0].depth, 2);
    }

    #[test]
    fn list_replace_is_default_policy() {
        let dest = leaf_map(&[("tags", Value::List(vec![Value::String("dev".into())]))]);
        let src = leaf_map(&[(
            "tags",
            Value::List(vec![Value::String("prod".into()), Value::String("east".into())]),
        )]);
        let opts = MergeOptions::new("stacks/prod.yaml", 1);

        let outcome = merge(&dest, &src, &opts);
        assert_eq!(
            outcome.value.get_path("tags"),
            Some(&Value::List(vec![
                Value::String("prod".into()),
                Value::String("east".into())
            ]))
        );
    }

    #[test]
    fn list_append_policy_concatenates() {
        let dest = leaf_map(&[("tags", Value::List(vec![Value::String("dev".into())]))]);
        let src = leaf_map(&[("tags", Value::List(vec![Value::String("prod".into())]))]);
        let mut opts = MergeOptions::new("stacks/prod.yaml", 1);
        opts.list_policies.set("tags", ListPolicy::Append);

        let outcome = merge(&dest, &src, &opts);
        assert_eq!(
            outcome.value.get_path("tags"),
            Some(&Value::List(vec![
                Value::String("dev".into()),
                Value::String("prod".into())
            ]))
        );
    }

    #[test]
    fn merge_by_key_matches_existing_entries_by_field() {
        let make_dep = |component: &str, kind: &str| {
            leaf_map(&[
                ("component", Value::String(component.into())),
                ("type", Value::String(kind.into())),
            ])
        };
        let dest = leaf_map(&[(
            "depends_on",
            Value::List(vec![make_dep("vpc", "terraform")]),
        )]);
        let src = leaf_map(&[(
            "depends_on",
            Value::List(vec![
                leaf_map(&[
                    ("component", Value::String("vpc".into())),
                    ("type", Value::String("terraform".into())),
                    ("optional", Value::Bool(true)),
                ]),
                make_dep("eks-cluster", "terraform"),
            ]),
        )]);
        let mut opts = MergeOptions::new("stacks/prod.yaml", 1);
        opts.list_policies
            .set("depends_on", ListPolicy::MergeByKey { key_field: "component".to_string() });

        let outcome = merge(&dest, &src, &opts);
        let deps = outcome.value.get_path("depends_on").unwrap().as_list().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(
            deps[0].get_path("optional"),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            deps[1].get_path("component"),
            Some(&Value::String("eks-cluster".into()))
        );
    }

    #[test]
    fn every_leaf_has_at_least_one_provenance_entry() {
        let dest = leaf_map(&[]);
        let src = leaf_map(&[(
            "vars",
            leaf_map(&[("cidr", Value::String("10.0.0.0/16".into())), ("count", Value::Number(Number::Int(3)))]),
        )]);
        let opts = MergeOptions::new("catalog/vpc.yaml", 2);

        let outcome = merge(&dest, &src, &opts);
        assert!(outcome.provenance.contains_key("vars.cidr"));
        assert!(outcome.provenance.contains_key("vars.count"));
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(cidr in "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,2}", count in 0i64..100) {
            let tree = leaf_map(&[
                ("cidr", Value::String(cidr)),
                ("count", Value::Number(Number::Int(count))),
            ]);
            let opts = MergeOptions::new("stacks/prod.yaml", 1);
            let outcome = merge(&tree, &tree, &opts);
            prop_assert_eq!(outcome.value, tree);
        }

        #[test]
        fn merge_is_independent_of_key_insertion_order(a in "[a-z]{1,5}", b in "[a-z]{1,5}") {
            prop_assume!(a != b);
            let dest = leaf_map(&[]);

            let mut first = BTreeMap::new();
            first.insert(a.clone(), Value::Number(Number::Int(1)));
            first.insert(b.clone(), Value::Number(Number::Int(2)));
            let src_a_then_b = Value::Map(first);

            let mut second = BTreeMap::new();
            second.insert(b.clone(), Value::Number(Number::Int(2)));
            second.insert(a.clone(), Value::Number(Number::Int(1)));
            let src_b_then_a = Value::Map(second);

            let opts = MergeOptions::new("catalog/base.yaml", 1);
            let outcome_a = merge(&dest, &src_a_then_b, &opts);
            let outcome_b = merge(&dest, &src_b_then_a, &opts);
            prop_assert_eq!(outcome_a.value, outcome_b.value);
        }
    }
}
