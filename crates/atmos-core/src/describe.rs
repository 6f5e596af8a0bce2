//! Backs the `describe {stacks|component|affected|dependents}` command
//! family: rendering a compiled `StackMap` (with optional
//! provenance annotation), and walking the dependency graph for the
//! `affected`/`dependents` reports.

use anyhow::{Context as _, Result};
use atmos_dag::DependencyGraph;
use atmos_provenance::{render_with_provenance, ProvenanceStore};
use atmos_types::{ComponentConfig, ComponentKey, StackMap};
use serde::Serialize;
use serde_json_path::JsonPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeFormat {
    Yaml,
    Json,
}

/// Render a whole compiled stack map, optionally narrowed by a JSONPath
/// query (`--query jsonpath`).
pub fn describe_stacks(stack_map: &StackMap, format: DescribeFormat, query: Option<&str>) -> Result<String> {
    render(stack_map, format, query)
}

/// Render a single component's merged configuration. When `provenance` is
/// given and `format` is YAML, each leaf gets a `# ○|●|∴ [N] file:line`
/// trailer (`--provenance`); JSON output never carries provenance comments
/// since JSON has no comment syntax.
pub fn describe_component(
    stack_map: &StackMap,
    stack: &str,
    kind: &str,
    name: &str,
    provenance: Option<&ProvenanceStore>,
    format: DescribeFormat,
    query: Option<&str>,
) -> Result<String> {
    let config = stack_map
        .get(stack, kind, name)
        .with_context(|| format!("no component `{kind}/{name}` in stack `{stack}`"))?;

    if let (Some(store), DescribeFormat::Yaml, None) = (provenance, format, query) {
        let value = config_to_value(config)?;
        return Ok(render_with_provenance(&value, store, stack, kind, name));
    }

    render(config, format, query)
}

/// Every component transitively affected by a set of changed components
/// (`affected`).
#[derive(Debug, Clone, Serialize)]
pub struct AffectedReport {
    pub changed: Vec<ComponentKey>,
    pub affected: Vec<ComponentKey>,
}

pub fn describe_affected(graph: &DependencyGraph, changed: &[ComponentKey]) -> AffectedReport {
    let mut affected: Vec<ComponentKey> = graph.affected(changed).into_iter().collect();
    affected.sort();
    AffectedReport { changed: changed.to_vec(), affected }
}

/// The one-hop reverse edges of a single component (`dependents`), distinct
/// from `affected`'s transitive closure.
#[derive(Debug, Clone, Serialize)]
pub struct DependentsReport {
    pub component: ComponentKey,
    pub direct_dependents: Vec<ComponentKey>,
}

pub fn describe_dependents(graph: &DependencyGraph, component: &ComponentKey) -> DependentsReport {
    let mut direct_dependents: Vec<ComponentKey> = graph.direct_dependents(component).into_iter().collect();
    direct_dependents.sort();
    DependentsReport { component: component.clone(), direct_dependents }
}

fn config_to_value(config: &ComponentConfig) -> Result<atmos_types::Value> {
    let json = serde_json::to_value(config).context("failed to serialize component config")?;
    serde_json::from_value(json).context("failed to convert component config to value tree")
}

fn render<T: Serialize>(data: &T, format: DescribeFormat, query: Option<&str>) -> Result<String> {
    let json = serde_json::to_value(data).context("failed to serialize describe output")?;
    let json = match query {
        Some(expr) => apply_query(&json, expr)?,
        None => json,
    };
    match format {
        DescribeFormat::Json => serde_json::to_string_pretty(&json).context("failed to render JSON"),
        DescribeFormat::Yaml => serde_yaml::to_string(&json).context("failed to render YAML"),
    }
}

fn apply_query(value: &serde_json::Value, expr: &str) -> Result<serde_json::Value> {
    let path = JsonPath::parse(expr).with_context(|| format!("invalid JSONPath query `{expr}`"))?;
    let matches: Vec<serde_json::Value> = path.query(value).all().into_iter().cloned().collect();
    Ok(serde_json::Value::Array(matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_types::{ComponentKey, StackMap};

    fn sample_stack_map() -> StackMap {
        let mut map = StackMap::new();
        map.insert("prod", "terraform", "vpc", ComponentConfig::default());
        map
    }

    #[test]
    fn describe_stacks_renders_yaml() {
        let map = sample_stack_map();
        let rendered = describe_stacks(&map, DescribeFormat::Yaml, None).unwrap();
        assert!(rendered.contains("prod"));
    }

    #[test]
    fn describe_component_errors_on_missing_component() {
        let map = sample_stack_map();
        let err = describe_component(&map, "prod", "terraform", "ghost", None, DescribeFormat::Json, None);
        assert!(err.is_err());
    }

    #[test]
    fn describe_component_applies_provenance_when_requested() {
        let map = sample_stack_map();
        let store = ProvenanceStore::new();
        let rendered = describe_component(&map, "prod", "terraform", "vpc", Some(&store), DescribeFormat::Yaml, None).unwrap();
        assert!(!rendered.is_empty());
    }

    #[test]
    fn describe_affected_reports_changed_and_affected() {
        let map = sample_stack_map();
        let graph = DependencyGraph::build(&map).unwrap();
        let changed = vec![ComponentKey::new("prod", "terraform", "vpc")];
        let report = describe_affected(&graph, &changed);
        assert_eq!(report.changed, changed);
        assert!(report.affected.contains(&ComponentKey::new("prod", "terraform", "vpc")));
    }

    #[test]
    fn describe_dependents_is_empty_for_a_leaf_component() {
        let map = sample_stack_map();
        let graph = DependencyGraph::build(&map).unwrap();
        let key = ComponentKey::new("prod", "terraform", "vpc");
        let report = describe_dependents(&graph, &key);
        assert!(report.direct_dependents.is_empty());
    }

    #[test]
    fn query_narrows_output_to_matched_nodes() {
        let map = sample_stack_map();
        let rendered = describe_stacks(&map, DescribeFormat::Json, Some("$.stacks.prod")).unwrap();
        assert!(rendered.contains("terraform"));
    }
}
