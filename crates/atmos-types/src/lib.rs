//! Core domain types shared across the Atmos workspace: the dynamically
//! typed manifest value tree, component instances, the compiled stack map,
//! identities/providers, and workflow step plumbing.
//!
//! Kept dependency-light (serde + chrono + serde_json only) so every other
//! crate in the workspace can depend on it without pulling in YAML parsing,
//! HTTP clients, or process execution.

pub mod auth_context;
pub mod component;
pub mod dag;
pub mod identity;
pub mod stack;
pub mod value;
pub mod workflow;

pub use auth_context::AuthContext;
pub use component::{
    ComponentConfig, ComponentKey, ComponentMetadata, DependsOn, SourceSpec, TargetPath,
    TargetPathOrigin,
};
pub use dag::NodeId;
pub use identity::{AuthConfig, Identity, Provider, TagMode, TagSet};
pub use stack::{CompileOutcome, StackCompileError, StackMap};
pub use value::{Number, PathSegment, Value};
pub use workflow::{OutputMode, StepResult, StepSpec, Variables, WorkflowDefinition};
