//! Cross-type dependency graph over a compiled stack map:
//! topological apply/destroy order and affected-analysis.

mod graph;

pub use graph::{Cycle, DependencyGraph};
