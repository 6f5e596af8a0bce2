//! DAG vertex re-export. The graph algorithms (topological sort, affected
//! closure) live in `atmos-dag`; this crate only owns the vertex identity so
//! every crate can refer to it without depending on the graph crate.

pub use crate::component::ComponentKey as NodeId;
