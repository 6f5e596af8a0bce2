//! Extracts the stack-level defaults (`vars`/`settings`/`env`) and the
//! `components.<type>.<name>` catalog from a stack's fully-merged import
//! tree ("Stack manifest format").

use std::collections::BTreeMap;

use atmos_types::Value;

/// Stack-wide `vars`/`settings`/`env`, cascaded as the base layer under
/// every component's own declarations (component wins on conflict). Not
/// literally named in algorithm steps, but implied by the manifest shape
/// and the only sensible reading of "per-component
/// materialization": a component catalog entry rarely repeats the whole
/// stack's vars, only what differs.
pub struct StackDefaults {
    pub vars: Value,
    pub settings: Value,
    pub env: Value,
}

pub fn stack_defaults(tree: &Value) -> StackDefaults {
    StackDefaults {
        vars: tree.get_path("vars").cloned().unwrap_or_else(Value::empty_map),
        settings: tree.get_path("settings").cloned().unwrap_or_else(Value::empty_map),
        env: tree.get_path("env").cloned().unwrap_or_else(Value::empty_map),
    }
}

/// `components.<type>.<name>` raw entries, with `metadata.type` defaulted
/// to the section key when the manifest omitted it ("metadata.type
/// is required when the section key does not uniquely determine it").
pub fn extract_catalog(tree: &Value) -> BTreeMap<String, BTreeMap<String, Value>> {
    let mut catalog = BTreeMap::new();
    let Some(components) = tree.get_path("components").and_then(Value::as_map) else {
        return catalog;
    };
    for (kind, names) in components {
        let Some(names_map) = names.as_map() else { continue };
        let mut per_type = BTreeMap::new();
        for (name, raw) in names_map {
            per_type.insert(name.clone(), default_metadata_type(raw, kind));
        }
        catalog.insert(kind.clone(), per_type);
    }
    catalog
}

fn default_metadata_type(raw: &Value, kind: &str) -> Value {
    let Some(map) = raw.as_map() else { return raw.clone() };
    let mut map = map.clone();
    let metadata = map.entry("metadata".to_string()).or_insert_with(Value::empty_map);
    if let Some(metadata_map) = metadata.as_map_mut() {
        metadata_map.entry("type".to_string()).or_insert_with(|| Value::String(kind.to_string()));
    }
    Value::Map(map)
}

/// Split a full-stack JSONPath like `components.terraform.vpc.vars.cidr`
/// into `(type, name, remaining_path)`, for re-keying merge-level
/// provenance into the `(stack, type, name, path)` shape wants.
pub fn split_component_path(path: &str) -> Option<(String, String, String)> {
    let rest = path.strip_prefix("components.")?;
    let mut parts = rest.splitn(3, '.');
    let kind = parts.next()?.to_string();
    let name = parts.next()?.to_string();
    let json_path = parts.next().unwrap_or("").to_string();
    Some((kind, name, json_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_catalog_and_defaults_metadata_type_to_section_key() {
        let content = "vars:\n  region: us-east-2\ncomponents:\n  terraform:\n    vpc:\n      vars:\n        cidr: 10.0.0.0/16\n";
        let doc = atmos_yaml::load("prod.yaml", content).unwrap();

        let defaults = stack_defaults(&doc.value);
        assert_eq!(defaults.vars.get_path("region"), Some(&Value::String("us-east-2".into())));

        let catalog = extract_catalog(&doc.value);
        let vpc = catalog.get("terraform").and_then(|t| t.get("vpc")).unwrap();
        assert_eq!(vpc.get_path("metadata.type"), Some(&Value::String("terraform".to_string())));
        assert_eq!(vpc.get_path("vars.cidr"), Some(&Value::String("10.0.0.0/16".into())));
    }

    #[test]
    fn explicit_metadata_type_is_not_overwritten() {
        let content = "components:\n  terraform:\n    vpc:\n      metadata:\n        type: custom-terraform\n";
        let doc = atmos_yaml::load("prod.yaml", content).unwrap();
        let catalog = extract_catalog(&doc.value);
        let vpc = catalog.get("terraform").and_then(|t| t.get("vpc")).unwrap();
        assert_eq!(vpc.get_path("metadata.type"), Some(&Value::String("custom-terraform".to_string())));
    }

    #[test]
    fn splits_component_path_prefix_from_remainder() {
        let (kind, name, rest) = split_component_path("components.terraform.vpc.vars.cidr").unwrap();
        assert_eq!(kind, "terraform");
        assert_eq!(name, "vpc");
        assert_eq!(rest, "vars.cidr");
    }

    #[test]
    fn non_component_path_does_not_split() {
        assert_eq!(split_component_path("vars.region"), None);
    }
}
