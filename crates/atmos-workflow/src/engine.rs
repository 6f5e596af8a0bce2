//! Sequential workflow execution: each step is template-expanded
//! against the accumulated `Variables`, dispatched to its registered
//! handler, and its `StepResult` captured under `steps.<name>` for later
//! steps to reference.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{OutputMode, StepSpec, Value, WorkflowDefinition};

use atmos_template::TemplateEngine;

use crate::context::StepContext;
use crate::handler::StepRegistry;

/// What happened to a workflow run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub completed_steps: Vec<String>,
    pub exit_code: i32,
}

/// Drives one workflow definition to completion against a step registry
/// and template engine supplied by the caller (`atmos-core` wires the real
/// ones; tests supply bare/stub instances).
pub struct WorkflowEngine {
    registry: Arc<StepRegistry>,
    template: Arc<TemplateEngine>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<StepRegistry>, template: Arc<TemplateEngine>) -> Self {
        Self { registry, template }
    }

    /// Run every step of `workflow` in order against `ctx`, mutating
    /// `ctx.vars.steps` as results come in. Stops early (without error) if
    /// a step requests an exit, or errors out on the first step failure.
    pub fn run(&self, workflow: &WorkflowDefinition, ctx: &mut StepContext) -> Result<RunOutcome> {
        let mut completed = Vec::new();

        for step in &workflow.steps {
            if ctx.cancellation.is_cancelled() {
                break;
            }

            let handler = self
                .registry
                .get(&step.kind)
                .ok_or_else(|| unsupported_step_kind(&step.kind, &self.registry))?;

            let vars_value = ctx.vars.to_value();
            let raw_inputs = Value::Map(step.inputs.clone());
            let rendered_inputs = self
                .template
                .render_value(&raw_inputs, &vars_value, ctx.auth.as_ref())
                .with_context(|| format!("rendering inputs for step `{}`", step.name))?;

            if handler.requires_tty() && !ctx.tty {
                return Err(AtmosError::new(ErrorKind::TtyRequired, format!("step `{}` requires an interactive terminal", step.name))
                    .with_hint("set ATMOS_FORCE_TTY to run this workflow with scripted defaults in CI")
                    .into());
            }

            ctx.output_mode = resolve_output_mode(workflow.output, step, ctx.tty);

            let result = handler.execute(ctx, step, &rendered_inputs).with_context(|| format!("step `{}` failed", step.name))?;

            ctx.vars.steps.insert(step.name.clone(), result);
            completed.push(step.name.clone());

            if let Some(code) = ctx.exit_requested {
                return Ok(RunOutcome { completed_steps: completed, exit_code: code });
            }
        }

        Ok(RunOutcome { completed_steps: completed, exit_code: 0 })
    }
}

fn unsupported_step_kind(kind: &str, registry: &StepRegistry) -> anyhow::Error {
    let known = registry.list_kinds();
    AtmosError::new(ErrorKind::UnsupportedKind, format!("unsupported step type: {kind}"))
        .with_hint(if known.is_empty() { "no step kinds are registered".to_string() } else { format!("registered kinds: {}", known.join(", ")) })
        .into()
}

/// Step-level `output` overrides the workflow-level default (itself
/// defaulting to `Log`); `viewport` downgrades to `log` when no TTY is
/// attached.
fn resolve_output_mode(workflow_default: Option<OutputMode>, step: &StepSpec, tty: bool) -> OutputMode {
    let mode = step.output.or(workflow_default).unwrap_or_default();
    if mode == OutputMode::Viewport && !tty {
        OutputMode::Log
    } else {
        mode
    }
}
