//! Sequential workflow step execution: a step registry keyed
//! by kind, per-run variable scope threaded through `{{ .steps.x.value }}`
//! template expansion, and TTY/output-mode policy for `atmos`/`shell`
//! steps.

pub mod builtin;
mod context;
mod engine;
mod handler;
mod prompter;
mod reporter;
#[cfg(test)]
mod testutil;
pub mod tty;

pub use builtin::register_builtins;
pub use context::StepContext;
pub use engine::{RunOutcome, WorkflowEngine};
pub use handler::{StepHandler, StepRegistry};
pub use prompter::{Prompter, StdinPrompter};
pub use reporter::{Reporter, RecordingReporter, SpinnerHandle, TerminalReporter};
