//! Command step kinds: `atmos`, `shell`.
//!
//! Output-mode policy lives here rather than in the engine: `viewport`
//! (framed, scrollback-capable), `raw` (direct passthrough, unframed),
//! `log` (framed with begin/end markers, the default), and `none` (silent,
//! exit code only). The engine has already resolved step-vs-workflow
//! override and the no-TTY `viewport`→`log` downgrade into
//! `StepContext::output_mode` before calling `execute`.

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_process::RunOptions;
use atmos_types::{OutputMode, StepResult, StepSpec, Value};

use crate::context::StepContext;
use crate::handler::StepHandler;

fn string_input(inputs: &Value, key: &str) -> Option<String> {
    inputs.as_map()?.get(key)?.as_str().map(str::to_string)
}

fn run_framed(ctx: &mut StepContext, step: &StepSpec, program: &str, args: &[&str]) -> Result<StepResult> {
    let opts = RunOptions::new().in_dir(&ctx.base_path).with_cancellation(ctx.cancellation.clone());

    match ctx.output_mode {
        OutputMode::None => {
            let output = atmos_process::run(program, args, &opts)?;
            output.clone().into_result(program)?;
            Ok(StepResult::value(output.stdout.trim_end().to_string()))
        }
        OutputMode::Raw => {
            let output = atmos_process::run(program, args, &opts)?;
            ctx.reporter.line(&output.stdout);
            if !output.stderr.is_empty() {
                ctx.reporter.line(&output.stderr);
            }
            output.clone().into_result(program)?;
            Ok(StepResult::value(output.stdout.trim_end().to_string()))
        }
        // `viewport` has already been downgraded to `log` by the engine
        // when no TTY is attached; both frame with begin/end markers here.
        OutputMode::Log | OutputMode::Viewport => {
            ctx.reporter.begin_framed(&step.name);
            let output = atmos_process::run(program, args, &opts)?;
            if !output.stdout.is_empty() {
                ctx.reporter.line(&output.stdout);
            }
            if !output.stderr.is_empty() {
                ctx.reporter.line(&output.stderr);
            }
            let success = output.success();
            ctx.reporter.end_framed(&step.name, success);
            output.clone().into_result(program)?;
            Ok(StepResult::value(output.stdout.trim_end().to_string()))
        }
    }
}

/// Runs `inputs.command` through `sh -c`.
pub struct ShellStep;

impl StepHandler for ShellStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let command = string_input(inputs, "command")
            .ok_or_else(|| AtmosError::new(ErrorKind::InvalidConfig, "step type `shell` requires input `command`"))?;
        run_framed(ctx, step, "sh", &["-c", &command])
    }
}

/// Re-invokes the `atmos` binary itself with `inputs.command` as a single
/// shell-quoted argument string (e.g. `terraform plan vpc -s prod`) — the
/// workflow engine does not link against `atmos-cli` to avoid a cyclic
/// dependency, so this dispatches to whatever `atmos` is resolvable on
/// `PATH`, exactly like a `shell` step targeting a fixed program name.
pub struct AtmosStep;

impl StepHandler for AtmosStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let command = string_input(inputs, "command")
            .ok_or_else(|| AtmosError::new(ErrorKind::InvalidConfig, "step type `atmos` requires input `command`"))?;
        if !atmos_process::command_exists("atmos") {
            return Err(AtmosError::new(ErrorKind::NotFound, "atmos binary not found on PATH")
                .with_hint("the `atmos` step type re-invokes the atmos CLI itself")
                .into());
        }
        run_framed(ctx, step, "sh", &["-c", &format!("atmos {command}")])
    }
}
