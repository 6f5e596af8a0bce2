//! Per-run state threaded through every step handler (steps run
//! sequentially, each captured under its `name` into the workflow
//! `Variables`; a cancelled context aborts the current step).

use std::path::PathBuf;
use std::sync::Arc;

use atmos_process::Cancellation;
use atmos_types::{AuthContext, OutputMode, Variables};

use crate::prompter::Prompter;
use crate::reporter::Reporter;
use crate::tty::tty_available;

/// Everything a step handler needs besides its own declared inputs.
pub struct StepContext {
    pub base_path: PathBuf,
    pub vars: Variables,
    pub auth: Option<AuthContext>,
    pub cancellation: Cancellation,
    pub prompter: Arc<dyn Prompter>,
    pub reporter: Arc<dyn Reporter>,
    /// Effective output mode for the step about to run, after workflow/step
    /// override resolution and the no-TTY `viewport`→`log` downgrade. Only
    /// meaningful to `atmos`/`shell` handlers; other handlers ignore it.
    pub output_mode: OutputMode,
    /// Set by the `exit` handler; the engine stops the run after the
    /// current step when this is `Some`.
    pub exit_requested: Option<i32>,
    /// Whether the engine should treat a terminal as attached. Defaults to
    /// the real [`tty_available`] detection, but callers (tests, or a CLI
    /// honoring `--no-input`) may override it directly rather than having
    /// to fake a real terminal or the `ATMOS_FORCE_TTY` env var.
    pub tty: bool,
}

impl StepContext {
    pub fn new(base_path: impl Into<PathBuf>, prompter: Arc<dyn Prompter>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            base_path: base_path.into(),
            vars: Variables::default(),
            auth: None,
            cancellation: Cancellation::default(),
            prompter,
            reporter,
            output_mode: OutputMode::Log,
            exit_requested: None,
            tty: tty_available(),
        }
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }
}
