//! Facade wiring the stack compiler, dependency DAG, auth manager, source
//! provisioner, and workflow engine into the entry point `atmos-cli` calls
//! ("the core exposes a small facade; the CLI is a thin
//! presentation layer over it").

pub mod auth_bridge;
pub mod builtin;
pub mod builtin_auth;
pub mod config;
pub mod core;
pub mod describe;
pub mod provider;
pub mod remote_state;

pub use auth_bridge::CoreAuthResolver;
pub use config::AtmosConfig;
pub use core::AtmosCore;
pub use describe::{describe_affected, describe_component, describe_dependents, describe_stacks, AffectedReport, DependentsReport, DescribeFormat};
pub use provider::{ComponentProvider, ComponentRegistry, ExecutionContext, SourceProvider, VendoredSourceProvider};
pub use remote_state::CoreRemoteStateResolver;
