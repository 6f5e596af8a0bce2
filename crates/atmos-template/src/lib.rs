//! `{{ }}` template expansion and custom YAML function evaluation
//!.

mod engine;
mod function;

pub use engine::{RemoteStateResolver, TemplateEngine, UnconfiguredResolver};
pub use function::{FunctionCall, FunctionRegistry, parse_function_call};
