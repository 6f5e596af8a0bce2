//! The step-handler capability ("step handlers register into a
//! step registry keyed by `type`... each handler declares `RequiresTTY()`").
//! Same `Registry<T>` kernel `atmos-auth::AuthResolverRegistry` uses, with
//! `T = Arc<dyn StepHandler>` this time ("no deep
//! inheritance... model each kind as a struct satisfying a flat capability
//! interface").

use std::sync::Arc;

use anyhow::Result;
use atmos_types::{StepResult, StepSpec, Value};

use crate::context::StepContext;

/// One registered step kind (`input`, `shell`, `table`, …).
pub trait StepHandler: Send + Sync {
    /// Whether this step kind needs a real terminal to run. The engine
    /// checks this against [`crate::tty::tty_available`] before calling
    /// [`StepHandler::execute`], so handlers never need to re-check it.
    fn requires_tty(&self) -> bool {
        false
    }

    /// Run the step. `inputs` is `step.inputs` after template expansion.
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult>;
}

/// `kind -> Arc<dyn StepHandler>` registry, keyed the same way
/// `atmos_registry::Registry` keys every other pluggable kind in this
/// workspace.
pub type StepRegistry = atmos_registry::Registry<Arc<dyn StepHandler>>;
