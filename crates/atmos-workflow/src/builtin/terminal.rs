//! Terminal step kinds: `alert`, `title`, `clear`, `env`, `exit`.

use anyhow::Result;
use atmos_types::{StepResult, StepSpec, Value};

use crate::context::StepContext;
use crate::handler::StepHandler;

fn string_input(inputs: &Value, key: &str) -> Option<String> {
    inputs.as_map()?.get(key)?.as_str().map(str::to_string)
}

/// A louder notice than `toast`, also logged at `warn` level.
pub struct AlertStep;

impl StepHandler for AlertStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let message = string_input(inputs, "message").unwrap_or_else(|| step.name.clone());
        tracing::warn!(step = %step.name, "{message}");
        ctx.reporter.line(&format!("!! {message}"));
        Ok(StepResult::value(message))
    }
}

/// Sets the terminal title via the standard OSC 0 escape sequence.
pub struct TitleStep;

impl StepHandler for TitleStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let title = string_input(inputs, "title").unwrap_or_default();
        ctx.reporter.line(&format!("\x1b]0;{title}\x07"));
        Ok(StepResult::value(title))
    }
}

/// Clears the terminal screen.
pub struct ClearStep;

impl StepHandler for ClearStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, _inputs: &Value) -> Result<StepResult> {
        ctx.reporter.line("\x1b[2J\x1b[H");
        Ok(StepResult::value(""))
    }
}

/// Sets `inputs.name` = `inputs.value` in the workflow's `Variables.env`
/// map for later steps to read via `{{ .env.<name> }}`. This is scoped to
/// the workflow's own variable tree, not the process environment.
pub struct EnvStep;

impl StepHandler for EnvStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let name = string_input(inputs, "name").ok_or_else(|| {
            atmos_errors::AtmosError::new(atmos_errors::ErrorKind::InvalidConfig, "step type `env` requires input `name`")
        })?;
        let value = string_input(inputs, "value").unwrap_or_default();
        ctx.vars.env.insert(name, value.clone());
        Ok(StepResult::value(value))
    }
}

/// Requests an early, successful stop of the workflow at the given exit
/// code (default 0). The engine checks [`StepContext::exit_requested`]
/// after the step returns and halts before running the next one.
pub struct ExitStep;

impl StepHandler for ExitStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let code = match inputs.as_map().and_then(|m| m.get("code")) {
            Some(Value::Number(n)) => match n {
                atmos_types::Number::Int(i) => *i as i32,
                atmos_types::Number::Float(f) => *f as i32,
            },
            _ => 0,
        };
        ctx.exit_requested = Some(code);
        Ok(StepResult::value(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use crate::testutil::ScriptedPrompter;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn step(kind: &str) -> StepSpec {
        StepSpec { name: kind.to_string(), kind: kind.to_string(), inputs: Default::default(), output: None }
    }

    fn ctx() -> StepContext {
        StepContext::new(".", Arc::new(ScriptedPrompter::new([])), Arc::new(RecordingReporter::default()))
    }

    #[test]
    fn env_step_populates_variables_env() {
        let mut ctx = ctx();
        let mut inputs = BTreeMap::new();
        inputs.insert("name".to_string(), Value::String("STAGE".to_string()));
        inputs.insert("value".to_string(), Value::String("prod".to_string()));
        EnvStep.execute(&mut ctx, &step("env"), &Value::Map(inputs)).unwrap();
        assert_eq!(ctx.vars.env.get("STAGE"), Some(&"prod".to_string()));
    }

    #[test]
    fn exit_step_sets_requested_exit_code() {
        let mut ctx = ctx();
        let mut inputs = BTreeMap::new();
        inputs.insert("code".to_string(), Value::Number(atmos_types::Number::Int(7)));
        ExitStep.execute(&mut ctx, &step("exit"), &Value::Map(inputs)).unwrap();
        assert_eq!(ctx.exit_requested, Some(7));
    }

    #[test]
    fn exit_step_defaults_to_zero() {
        let mut ctx = ctx();
        ExitStep.execute(&mut ctx, &step("exit"), &Value::empty_map()).unwrap();
        assert_eq!(ctx.exit_requested, Some(0));
    }
}
