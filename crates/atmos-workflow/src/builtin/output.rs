//! Output step kinds: `spin`, `table`, `pager`, `format`,
//! `join`, `style`, `linebreak`, `log`.

use std::collections::BTreeMap;

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_process::RunOptions;
use atmos_types::{StepResult, StepSpec, Value};

use crate::context::StepContext;
use crate::handler::StepHandler;

fn string_input(inputs: &Value, key: &str) -> Option<String> {
    inputs.as_map()?.get(key)?.as_str().map(str::to_string)
}

fn missing(step: &str, field: &str) -> anyhow::Error {
    AtmosError::new(ErrorKind::InvalidConfig, format!("step type `{step}` requires input `{field}`")).into()
}

/// Runs `inputs.command` under a spinner, returning its trimmed stdout.
pub struct SpinStep;

impl StepHandler for SpinStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let command = string_input(inputs, "command").ok_or_else(|| missing("spin", "command"))?;
        let label = string_input(inputs, "label").unwrap_or_else(|| step.name.clone());
        let handle = ctx.reporter.spinner(&label);

        let opts = RunOptions::new().in_dir(&ctx.base_path).with_cancellation(ctx.cancellation.clone());
        let outcome = atmos_process::run_checked("sh", &["-c", &command], &opts);

        let success = outcome.is_ok();
        handle.finish(if success { &format!("{label}: done") } else { &format!("{label}: failed") });
        let output = outcome?;
        Ok(StepResult::value(output.stdout.trim_end().to_string()))
    }
}

/// Renders `inputs.rows` (a list of maps) as a fixed-width text table.
pub struct TableStep;

impl StepHandler for TableStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let rows = inputs.as_map().and_then(|m| m.get("rows")).and_then(Value::as_list).unwrap_or(&[]);
        let rendered = render_table(rows);
        ctx.reporter.line(&rendered);
        Ok(StepResult::value(rendered))
    }
}

fn render_table(rows: &[Value]) -> String {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(map) = row.as_map() {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut lines = vec![columns.join(" | ")];
    for row in rows {
        let map = row.as_map().cloned().unwrap_or_default();
        let cells: Vec<String> = columns.iter().map(|c| cell_text(&map, c)).collect();
        lines.push(cells.join(" | "));
    }
    lines.join("\n")
}

fn cell_text(map: &BTreeMap<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Frames `inputs.content` for scrollback the way a pager would, without
/// actually shelling out to `less` (`viewport` already covers
/// the TTY/no-TTY branch for `atmos`/`shell` output; `pager` is the
/// standalone step kind for arbitrary long text).
pub struct PagerStep;

impl StepHandler for PagerStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let content = string_input(inputs, "content").ok_or_else(|| missing("pager", "content"))?;
        ctx.reporter.begin_framed(&step.name);
        ctx.reporter.line(&content);
        ctx.reporter.end_framed(&step.name, true);
        Ok(StepResult::value(content))
    }
}

/// Re-serializes `inputs.value` as `inputs.format` (`yaml` default, or
/// `json`).
pub struct FormatStep;

impl StepHandler for FormatStep {
    fn execute(&self, _ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let value = inputs.as_map().and_then(|m| m.get("value")).cloned().unwrap_or(Value::Null);
        let format = string_input(inputs, "format").unwrap_or_else(|| "yaml".to_string());
        let rendered = match format.as_str() {
            "json" => serde_json::to_string_pretty(&value)?,
            "yaml" => serde_yaml::to_string(&value)?,
            other => {
                return Err(AtmosError::new(ErrorKind::InvalidConfig, format!("unsupported format: {other}"))
                    .with_hint("use `yaml` or `json`")
                    .into());
            }
        };
        Ok(StepResult::value(rendered))
    }
}

/// Joins `inputs.values` (a list of strings) with `inputs.separator`
/// (default `", "`).
pub struct JoinStep;

impl StepHandler for JoinStep {
    fn execute(&self, _ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let values: Vec<String> = inputs
            .as_map()
            .and_then(|m| m.get("values"))
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let separator = string_input(inputs, "separator").unwrap_or_else(|| ", ".to_string());
        Ok(StepResult::value(values.join(&separator)))
    }
}

/// Wraps `inputs.text` in a named decoration (`bold`, `italic`, or a
/// passthrough default); terminal color is out of scope (spec `NO_COLOR`
/// honoring lives in the CLI's rendering layer, not here), so this emits
/// plain markdown-style markers rather than ANSI codes.
pub struct StyleStep;

impl StepHandler for StyleStep {
    fn execute(&self, _ctx: &mut StepContext, _step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let text = string_input(inputs, "text").unwrap_or_default();
        let style = string_input(inputs, "style").unwrap_or_default();
        let styled = match style.as_str() {
            "bold" => format!("**{text}**"),
            "italic" => format!("_{text}_"),
            _ => text,
        };
        Ok(StepResult::value(styled))
    }
}

/// Emits a blank line.
pub struct LinebreakStep;

impl StepHandler for LinebreakStep {
    fn execute(&self, ctx: &mut StepContext, _step: &StepSpec, _inputs: &Value) -> Result<StepResult> {
        ctx.reporter.line("");
        Ok(StepResult::value(""))
    }
}

/// Logs `inputs.message` through `tracing` and the reporter.
pub struct LogStep;

impl StepHandler for LogStep {
    fn execute(&self, ctx: &mut StepContext, step: &StepSpec, inputs: &Value) -> Result<StepResult> {
        let message = string_input(inputs, "message").unwrap_or_else(|| step.name.clone());
        tracing::info!(step = %step.name, "{message}");
        ctx.reporter.line(&message);
        Ok(StepResult::value(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use crate::testutil::ScriptedPrompter;
    use std::sync::Arc;

    fn ctx() -> StepContext {
        StepContext::new(".", Arc::new(ScriptedPrompter::new([])), Arc::new(RecordingReporter::default()))
    }

    fn step(kind: &str) -> StepSpec {
        StepSpec { name: kind.to_string(), kind: kind.to_string(), inputs: Default::default(), output: None }
    }

    #[test]
    fn join_step_joins_with_default_separator() {
        let mut ctx = ctx();
        let mut inputs = BTreeMap::new();
        inputs.insert("values".to_string(), Value::List(vec![Value::String("a".into()), Value::String("b".into())]));
        let result = JoinStep.execute(&mut ctx, &step("join"), &Value::Map(inputs)).unwrap();
        assert_eq!(result.value, "a, b");
    }

    #[test]
    fn style_step_bold_wraps_with_asterisks() {
        let mut ctx = ctx();
        let mut inputs = BTreeMap::new();
        inputs.insert("text".to_string(), Value::String("hi".into()));
        inputs.insert("style".to_string(), Value::String("bold".into()));
        let result = StyleStep.execute(&mut ctx, &step("style"), &Value::Map(inputs)).unwrap();
        assert_eq!(result.value, "**hi**");
    }

    #[test]
    fn table_step_renders_header_and_rows() {
        let mut ctx = ctx();
        let mut row = BTreeMap::new();
        row.insert("name".to_string(), Value::String("vpc".into()));
        let mut inputs = BTreeMap::new();
        inputs.insert("rows".to_string(), Value::List(vec![Value::Map(row)]));
        let result = TableStep.execute(&mut ctx, &step("table"), &Value::Map(inputs)).unwrap();
        assert_eq!(result.value, "name\nvpc");
    }

    #[test]
    fn format_step_rejects_unknown_format() {
        let mut ctx = ctx();
        let mut inputs = BTreeMap::new();
        inputs.insert("format".to_string(), Value::String("toml".into()));
        let err = FormatStep.execute(&mut ctx, &step("format"), &Value::Map(inputs)).unwrap_err();
        assert_eq!(AtmosError::downcast(&err).unwrap().kind, ErrorKind::InvalidConfig);
    }

    #[test]
    fn log_step_returns_message_and_records_line() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut ctx = StepContext::new(".", Arc::new(ScriptedPrompter::new([])), reporter.clone());
        let mut inputs = BTreeMap::new();
        inputs.insert("message".to_string(), Value::String("hello".into()));
        let result = LogStep.execute(&mut ctx, &step("log"), &Value::Map(inputs)).unwrap();
        assert_eq!(result.value, "hello");
        assert_eq!(*reporter.lines.lock().unwrap(), vec!["hello"]);
    }
}
