//! Stack manifest compiler: resolves a stack's import DAG,
//! extracts its component catalog, resolves `metadata.inherits`, cascades
//! stack-wide defaults, and renders templates into a `StackMap`.

mod cache;
mod catalog;
mod compiler;
mod graph;
mod import;
mod inherit;
mod render;
mod search;

pub use cache::FileCache;
pub use catalog::{StackDefaults, extract_catalog, split_component_path, stack_defaults};
pub use compiler::{CompiledStacks, RegisteredTypes, StackCompiler};
pub use graph::{Cycle, depths, topological_sort};
pub use import::{MergeLayer, merge_order};
pub use inherit::resolve_inheritance;
pub use render::render_component;
pub use search::{StackSearchPaths, display_path};
