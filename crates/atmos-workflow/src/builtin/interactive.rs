//! Interactive step kinds: `input`, `choose`, `confirm`,
//! `filter`, `file`, `write`.

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{StepResult, StepSpec, Value};

use crate::context::StepContext;
use crate::handler::StepHandler;

fn string_input(inputs: &Value, key: &str) -> Option<String> {
    inputs.as_map()?.get(key)?.as_str().map(str::to_string)
}

fn list_input(inputs: &Value, key: &str) -> Vec<String> {
    inputs
        .as_map()
        .and_then(|m| m.get(key))
        .and_then(Value::as_list)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn missing(step: &str, field: &str) -> anyhow::Error {
    AtmosError::new(ErrorKind::InvalidConfig, format!("step type `{step}` requires input `{field}`")).into()
}

pub struct InputStep;

impl StepHandler for InputStep {
    fn requires_tty(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let prompt = string_input(inputs, "prompt").unwrap_or_else(|| step.name.clone());
        let default = string_input(inputs, "default");
        let answer = ctx.prompter.input(&prompt, default.as_deref())?;
        Ok(StepResult::value(answer))
    }
}

pub struct ChooseStep;

impl StepHandler for ChooseStep {
    fn requires_tty(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let options = list_input(inputs, "options");
        if options.is_empty() {
            return Err(missing("choose", "options"));
        }
        let prompt = string_input(inputs, "prompt").unwrap_or_else(|| step.name.clone());
        let answer = ctx.prompter.choose(&prompt, &options)?;
        Ok(StepResult::value(answer))
    }
}

pub struct ConfirmStep;

impl StepHandler for ConfirmStep {
    fn requires_tty(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let prompt = string_input(inputs, "prompt").unwrap_or_else(|| step.name.clone());
        let default = matches!(inputs.as_map().and_then(|m| m.get("default")), Some(Value::Bool(true)));
        let confirmed = ctx.prompter.confirm(&prompt, default)?;
        Ok(StepResult::value(if confirmed { "true" } else { "false" }))
    }
}

pub struct FilterStep;

impl StepHandler for FilterStep {
    fn requires_tty(&self) -> bool {
        true
    }

    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let options = list_input(inputs, "options");
        if options.is_empty() {
            return Err(missing("filter", "options"));
        }
        let prompt = string_input(inputs, "prompt").unwrap_or_else(|| step.name.clone());
        let answer = ctx.prompter.filter(&prompt, &options)?;
        Ok(StepResult::value(answer))
    }
}

/// Prompts for a path if `inputs.path` is absent, otherwise uses it as-is.
/// Fails if the resolved path does not exist, unless `inputs.must_exist` is
/// explicitly `false`.
pub struct FileStep;

impl StepHandler for FileStep {
    fn requires_tty(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let path = match string_input(inputs, "path") {
            Some(p) => p,
            None => ctx.prompter.input(&format!("{}: path", step.name), None)?,
        };
        let must_exist = !matches!(inputs.as_map().and_then(|m| m.get("must_exist")), Some(Value::Bool(false)));
        let resolved = ctx.base_path.join(&path);
        if must_exist && !resolved.exists() {
            return Err(AtmosError::new(ErrorKind::NotFound, format!("file not found: {}", resolved.display())).into());
        }
        Ok(StepResult::value(path))
    }
}

/// Writes `inputs.content` to `inputs.path`, creating parent directories as
/// needed.
pub struct WriteStep;

impl StepHandler for WriteStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let path = string_input(inputs, "path").ok_or_else(|| missing("write", "path"))?;
        let content = string_input(inputs, "content").unwrap_or_default();
        let resolved = ctx.base_path.join(&path);
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&resolved, &content)?;
        Ok(StepResult::value(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use crate::testutil::ScriptedPrompter;
    use std::sync::Arc;

    fn ctx_with(answers: impl IntoIterator<Item = &'static str>) -> StepContext {
        StepContext::new(".", Arc::new(ScriptedPrompter::new(answers)), Arc::new(RecordingReporter::default()))
    }

    fn step(kind: &str) -> StepSpec {
        StepSpec { name: kind.to_string(), kind: kind.to_string(), inputs: Default::default(), output: None }
    }

    #[test]
    fn input_step_returns_prompter_answer() {
        let mut ctx = ctx_with(["prod"]);
        let result = InputStep.execute(&mut ctx, &step("input"), &Value::empty_map()).unwrap();
        assert_eq!(result.value, "prod");
    }

    #[test]
    fn choose_step_requires_options() {
        let mut ctx = ctx_with([]);
        let err = ChooseStep.execute(&mut ctx, &step("choose"), &Value::empty_map()).unwrap_err();
        let atmos_err = AtmosError::downcast(&err).unwrap();
        assert_eq!(atmos_err.kind, ErrorKind::InvalidConfig);
    }

    #[test]
    fn confirm_step_maps_yes_to_true() {
        let mut ctx = ctx_with(["y"]);
        let result = ConfirmStep.execute(&mut ctx, &step("confirm"), &Value::empty_map()).unwrap();
        assert_eq!(result.value, "true");
    }

    #[test]
    fn write_step_creates_file_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = StepContext::new(dir.path(), Arc::new(ScriptedPrompter::new([])), Arc::new(RecordingReporter::default()));
        let mut inputs = std::collections::BTreeMap::new();
        inputs.insert("path".to_string(), Value::String("out.txt".to_string()));
        inputs.insert("content".to_string(), Value::String("hello".to_string()));
        let result = WriteStep.execute(&mut ctx, &step("write"), &Value::Map(inputs)).unwrap();
        assert_eq!(result.value, "out.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello");
    }

    #[test]
    fn file_step_errors_when_missing_and_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = StepContext::new(dir.path(), Arc::new(ScriptedPrompter::new([])), Arc::new(RecordingReporter::default()));
        let mut inputs = std::collections::BTreeMap::new();
        inputs.insert("path".to_string(), Value::String("missing.txt".to_string()));
        let err = FileStep.execute(&mut ctx, &step("file"), &Value::Map(inputs)).unwrap_err();
        let atmos_err = AtmosError::downcast(&err).unwrap();
        assert_eq!(atmos_err.kind, ErrorKind::NotFound);
    }
}
