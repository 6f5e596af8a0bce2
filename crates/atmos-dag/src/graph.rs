//! Cross-type dependency graph: vertices are `(stack, type,
//! name)` component instances, edges come from `metadata.depends_on`.
//! Separate from `atmos-compiler`'s own import/inheritance DAGs — this one
//! operates over the already-compiled `StackMap`, not raw manifest trees,
//! so it has no reason to share code with that crate's cycle-detecting
//! walk; the two sit at different layers of the same workspace.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{ComponentKey, StackMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// The cross-type dependency graph for a compiled `StackMap`. `A -> B`
/// means "A depends on B" (B must apply before A, "Edge: for
/// each entry `d` in `metadata.depends_on`, add `self -> (self.stack,
/// d.type, d.component)`").
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<ComponentKey>,
    edges: BTreeMap<ComponentKey, Vec<ComponentKey>>,
    reverse: BTreeMap<ComponentKey, Vec<ComponentKey>>,
}

impl DependencyGraph {
    /// Build the graph from every component instance in `stack_map`.
    /// `d.type` defaults to the referencing component's own type; `d.stack`
    /// defaults to the referencing component's own stack (cross-stack
    /// dependencies are legal but rare — an explicit `stack` field in
    /// `depends_on` is the only way to declare one).
    pub fn build(stack_map: &StackMap) -> Result<Self> {
        let mut nodes = BTreeSet::new();
        let mut edges: BTreeMap<ComponentKey, Vec<ComponentKey>> = BTreeMap::new();
        let mut reverse: BTreeMap<ComponentKey, Vec<ComponentKey>> = BTreeMap::new();

        for key in stack_map.component_keys() {
            nodes.insert(key.clone());
            let config = stack_map
                .get(&key.stack, &key.kind, &key.name)
                .expect("component_keys only lists entries present in the map");

            let mut targets = Vec::with_capacity(config.metadata.depends_on.len());
            for dep in &config.metadata.depends_on {
                let target = ComponentKey::new(
                    dep.stack.clone().unwrap_or_else(|| key.stack.clone()),
                    dep.kind.clone().unwrap_or_else(|| key.kind.clone()),
                    dep.component.clone(),
                );
                targets.push(target.clone());
                reverse.entry(target).or_default().push(key.clone());
            }
            edges.insert(key, targets);
        }

        let graph = Self { nodes, edges, reverse };
        graph.validate_targets_exist()?;
        graph.topological_order().map_err(|cycle| cyclic_dependency_error(&cycle))?;
        Ok(graph)
    }

    fn validate_targets_exist(&self) -> Result<()> {
        for (source, targets) in &self.edges {
            for target in targets {
                if !self.nodes.contains(target) {
                    return Err(AtmosError::new(
                        ErrorKind::InvalidConfig,
                        format!("{source} depends on `{target}`, which does not exist after compile"),
                    )
                    .with_hint("depends_on entries must reference a (stack, type, name) that exists in the compiled stack map")
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Dependencies-before-dependents order: `vpc` before `eks-cluster`
    /// before `app`. Ties break lexically by
    /// `ComponentKey`'s `Ord` (stack, then type, then name) for a
    /// reproducible order independent of map iteration upstream.
    ///
    /// Infallible: `build` already rejects any graph with a cycle, so a
    /// live `DependencyGraph` is always acyclic.
    pub fn apply_order(&self) -> Vec<ComponentKey> {
        self.topological_order().expect("cycle-freedom validated at construction")
    }

    /// The reverse of `apply_order`: dependents before their dependencies,
    /// so tearing down `app` never runs before `app` depends on nothing
    /// left standing.
    pub fn destroy_order(&self) -> Vec<ComponentKey> {
        let mut order = self.apply_order();
        order.reverse();
        order
    }

    /// `Affected(changed)`: the transitive closure over reverse edges
    /// (callers) of `changed` — "B ∈ Affected({A}) iff there is
    /// a path B =>* A through reverse dependency edges." The input set is
    /// always included in its own closure.
    pub fn affected(&self, changed: &[ComponentKey]) -> BTreeSet<ComponentKey> {
        let mut affected = BTreeSet::new();
        let mut stack: Vec<ComponentKey> = changed.to_vec();
        while let Some(node) = stack.pop() {
            if !affected.insert(node.clone()) {
                continue;
            }
            if let Some(dependents) = self.reverse.get(&node) {
                for dependent in dependents {
                    if !affected.contains(dependent) {
                        stack.push(dependent.clone());
                    }
                }
            }
        }
        affected
    }

    /// The components that directly depend on `key` (one reverse-edge hop),
    /// as opposed to [`DependencyGraph::affected`]'s transitive closure.
    /// Backs `describe dependents`, the CLI's one-level counterpart to
    /// `describe affected`.
    pub fn direct_dependents(&self, key: &ComponentKey) -> BTreeSet<ComponentKey> {
        self.reverse.get(key).cloned().unwrap_or_default().into_iter().collect()
    }

    fn topological_order(&self) -> Result<Vec<ComponentKey>, Cycle> {
        let mut roots: Vec<ComponentKey> = self.nodes.iter().cloned().collect();
        roots.sort();

        let mut mark: BTreeMap<ComponentKey, Mark> = BTreeMap::new();
        let mut order = Vec::with_capacity(roots.len());
        let mut path: Vec<ComponentKey> = Vec::new();

        for root in &roots {
            self.visit(root, &mut mark, &mut order, &mut path)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        node: &ComponentKey,
        mark: &mut BTreeMap<ComponentKey, Mark>,
        order: &mut Vec<ComponentKey>,
        path: &mut Vec<ComponentKey>,
    ) -> Result<(), Cycle> {
        match mark.get(node).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                let start = path.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle_path = path[start..].to_vec();
                cycle_path.push(node.clone());
                return Err(Cycle { path: cycle_path });
            }
            Mark::Unvisited => {}
        }

        mark.insert(node.clone(), Mark::InProgress);
        path.push(node.clone());

        let mut children = self.edges.get(node).cloned().unwrap_or_default();
        children.sort();
        for child in &children {
            self.visit(child, mark, order, path)?;
        }

        path.pop();
        mark.insert(node.clone(), Mark::Done);
        order.push(node.clone());
        Ok(())
    }
}

/// A cycle found mid-walk: the path from where it starts back to itself.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub path: Vec<ComponentKey>,
}

fn cyclic_dependency_error(cycle: &Cycle) -> anyhow::Error {
    let rendered: Vec<String> = cycle.path.iter().map(ToString::to_string).collect();
    AtmosError::new(ErrorKind::CyclicDependency, format!("cyclic dependency: {}", rendered.join(" -> "))).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_types::{ComponentConfig, ComponentMetadata, DependsOn};

    fn config_depending_on(deps: &[(&str, &str)]) -> ComponentConfig {
        ComponentConfig {
            metadata: ComponentMetadata {
                depends_on: deps
                    .iter()
                    .map(|(component, kind)| DependsOn {
                        component: component.to_string(),
                        kind: Some(kind.to_string()),
                        stack: None,
                    })
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sample_stack_map() -> StackMap {
        let mut stack_map = StackMap::new();
        stack_map.insert("prod-ue2", "terraform", "vpc", config_depending_on(&[]));
        stack_map.insert(
            "prod-ue2",
            "terraform",
            "eks-cluster",
            config_depending_on(&[("vpc", "terraform")]),
        );
        stack_map.insert(
            "prod-ue2",
            "helmfile",
            "app",
            config_depending_on(&[("eks-cluster", "terraform")]),
        );
        stack_map
    }

    #[test]
    fn apply_order_places_dependencies_before_dependents() {
        let stack_map = sample_stack_map();
        let graph = DependencyGraph::build(&stack_map).unwrap();
        let order = graph.apply_order();
        let names: Vec<&str> = order.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["vpc", "eks-cluster", "app"]);
    }

    #[test]
    fn destroy_order_is_the_reverse_of_apply_order() {
        let stack_map = sample_stack_map();
        let graph = DependencyGraph::build(&stack_map).unwrap();
        let apply = graph.apply_order();
        let destroy = graph.destroy_order();
        let mut reversed = apply.clone();
        reversed.reverse();
        assert_eq!(destroy, reversed);
    }

    #[test]
    fn affected_closure_includes_every_transitive_dependent() {
        let stack_map = sample_stack_map();
        let graph = DependencyGraph::build(&stack_map).unwrap();
        let vpc = ComponentKey::new("prod-ue2", "terraform", "vpc");
        let affected = graph.affected(&[vpc]);
        let names: BTreeSet<&str> = affected.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["vpc", "eks-cluster", "app"]));
    }

    #[test]
    fn direct_dependents_is_only_one_hop() {
        let stack_map = sample_stack_map();
        let graph = DependencyGraph::build(&stack_map).unwrap();
        let vpc = ComponentKey::new("prod-ue2", "terraform", "vpc");
        let dependents = graph.direct_dependents(&vpc);
        let names: BTreeSet<&str> = dependents.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, BTreeSet::from(["eks-cluster"]));
    }

    #[test]
    fn affected_of_a_leaf_is_itself_only() {
        let stack_map = sample_stack_map();
        let graph = DependencyGraph::build(&stack_map).unwrap();
        let app = ComponentKey::new("prod-ue2", "helmfile", "app");
        let affected = graph.affected(&[app.clone()]);
        assert_eq!(affected, BTreeSet::from([app]));
    }

    #[test]
    fn cyclic_dependency_is_rejected() {
        let mut stack_map = StackMap::new();
        stack_map.insert("prod", "terraform", "a", config_depending_on(&[("b", "terraform")]));
        stack_map.insert("prod", "terraform", "b", config_depending_on(&[("a", "terraform")]));

        let err = DependencyGraph::build(&stack_map).unwrap_err();
        let atmos_err = AtmosError::downcast(&err).expect("sentinel");
        assert_eq!(atmos_err.kind, ErrorKind::CyclicDependency);
    }

    #[test]
    fn dependency_on_a_missing_component_is_rejected() {
        let mut stack_map = StackMap::new();
        stack_map.insert("prod", "terraform", "a", config_depending_on(&[("does-not-exist", "terraform")]));

        let err = DependencyGraph::build(&stack_map).unwrap_err();
        let atmos_err = AtmosError::downcast(&err).expect("sentinel");
        assert_eq!(atmos_err.kind, ErrorKind::InvalidConfig);
    }

    #[test]
    fn depends_on_type_defaults_to_the_referencing_components_own_type() {
        let mut stack_map = StackMap::new();
        stack_map.insert("prod", "terraform", "vpc", config_depending_on(&[]));
        let dep = ComponentConfig {
            metadata: ComponentMetadata {
                depends_on: vec![DependsOn { component: "vpc".to_string(), kind: None, stack: None }],
                ..Default::default()
            },
            ..Default::default()
        };
        stack_map.insert("prod", "terraform", "eks-cluster", dep);

        let graph = DependencyGraph::build(&stack_map).unwrap();
        let order = graph.apply_order();
        assert_eq!(order[0].name, "vpc");
    }
}
