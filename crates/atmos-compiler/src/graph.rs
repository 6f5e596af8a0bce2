//! Generic cycle-detecting topological sort, shared by the import DAG
//! and the inheritance DAG (step 4). Both are "a small
//! DAG over strings/keys, cycles fatal, deterministic lexical tie-break" —
//! rather than writing the same depth-first walk twice, the node-specific
//! modules (`import`, `inherit`) only supply an edge function.

use std::collections::BTreeMap;

/// A cycle found mid-walk: the path from where the cycle starts back to
/// itself, in visit order.
#[derive(Debug, Clone)]
pub struct Cycle<T> {
    pub path: Vec<T>,
}

impl<T: std::fmt::Display> std::fmt::Display for Cycle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.path.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", rendered.join(" -> "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first topological sort: nodes come back in "dependencies before
/// dependents" order (a node is pushed to the result only after every node
/// it points to). Ties are broken lexically — both the set of root nodes
/// and each node's successors are visited in sorted order — so the result
/// is reproducible across runs regardless of map-iteration order upstream.
pub fn topological_sort<T, F>(nodes: &[T], mut edges: F) -> Result<Vec<T>, Cycle<T>>
where
    T: Ord + Clone,
    F: FnMut(&T) -> Vec<T>,
{
    let mut roots: Vec<T> = nodes.to_vec();
    roots.sort();
    roots.dedup();

    let mut mark: BTreeMap<T, Mark> = BTreeMap::new();
    let mut order = Vec::with_capacity(roots.len());
    let mut path: Vec<T> = Vec::new();

    for root in &roots {
        visit(root, &mut edges, &mut mark, &mut order, &mut path)?;
    }

    Ok(order)
}

fn visit<T, F>(
    node: &T,
    edges: &mut F,
    mark: &mut BTreeMap<T, Mark>,
    order: &mut Vec<T>,
    path: &mut Vec<T>,
) -> Result<(), Cycle<T>>
where
    T: Ord + Clone,
    F: FnMut(&T) -> Vec<T>,
{
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

    let mut children = edges(node);
    children.sort();
    for child in &children {
        visit(child, edges, mark, order, path)?;
    }

    path.pop();
    mark.insert(node.clone(), Mark::Done);
    order.push(node.clone());
    Ok(())
}

/// Distance of each node from the set of roots, measured along the first
/// path discovered to it during the same depth-first walk `topological_sort`
/// performs. Used to stamp provenance `depth`: distance along the import
/// chain.
pub fn depths<T, F>(nodes: &[T], mut edges: F) -> BTreeMap<T, u32>
where
    T: Ord + Clone,
    F: FnMut(&T) -> Vec<T>,
{
    let mut roots: Vec<T> = nodes.to_vec();
    roots.sort();
    roots.dedup();

    let mut depth: BTreeMap<T, u32> = BTreeMap::new();
    for root in &roots {
        walk_depth(root, 0, &mut edges, &mut depth);
    }
    depth
}

fn walk_depth<T, F>(node: &T, current: u32, edges: &mut F, depth: &mut BTreeMap<T, u32>)
where
    T: Ord + Clone,
    F: FnMut(&T) -> Vec<T>,
{
    let better = depth.get(node).is_none_or(|&d| current < d);
    if !better {
        return;
    }
    depth.insert(node.clone(), current);
    for child in edges(node) {
        walk_depth(&child, current + 1, edges, depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_dependencies_before_dependents() {
        let nodes = vec!["root", "base", "mid"];
        let order = topological_sort(&nodes, |n| match *n {
            "root" => vec!["mid"],
            "mid" => vec!["base"],
            _ => vec![],
        })
        .unwrap();
        assert_eq!(order, vec!["base", "mid", "root"]);
    }

    #[test]
    fn ties_break_lexically() {
        let nodes = vec!["b", "a", "c"];
        let order = topological_sort(&nodes, |_| vec![]).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_a_cycle() {
        let nodes = vec!["a", "b", "c"];
        let err = topological_sort(&nodes, |n| match *n {
            "a" => vec!["b"],
            "b" => vec!["c"],
            "c" => vec!["a"],
            _ => vec![],
        })
        .unwrap_err();
        assert!(err.path.contains(&"a"));
        assert!(err.path.len() >= 3);
    }

    #[test]
    fn depth_is_shortest_discovered_distance_from_a_root() {
        let nodes = vec!["root", "a", "b"];
        let d = depths(&nodes, |n| match *n {
            "root" => vec!["a"],
            "a" => vec!["b"],
            _ => vec![],
        });
        assert_eq!(d["root"], 0);
        assert_eq!(d["a"], 1);
        assert_eq!(d["b"], 2);
    }
}
