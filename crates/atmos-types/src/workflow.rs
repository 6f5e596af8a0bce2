//! Workflow step/result/variable data model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One step declaration inside a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Step-level output-mode override for `atmos`/`shell` steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMode>,
}

/// A workflow's full definition: steps plus workflow-level defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<bool>,
}

/// `atmos`/`shell` step output-display policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Viewport,
    Raw,
    Log,
    None,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Log
    }
}

/// What a step handler returns after running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub skipped: bool,
}

impl StepResult {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn skip() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// `{ steps: map[name]->result, env: map[string]string }` per #[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variables {
    pub steps: BTreeMap<String, StepResult>,
    pub env: BTreeMap<String, String>,
}

impl Variables {
    /// Build the `tera`-compatible context object template expansion reads
    /// `{{ .steps.<name>.value }}` from. Mirrors Go-template dotted-field
    /// access with a leading `.`; `atmos-template` strips it before handing
    /// the expression to `tera`.
    pub fn to_value(&self) -> Value {
        let steps = self
            .steps
            .iter()
            .map(|(name, result)| {
                let mut m = BTreeMap::new();
                m.insert("value".to_string(), Value::String(result.value.clone()));
                m.insert(
                    "values".to_string(),
                    Value::List(result.values.iter().cloned().map(Value::String).collect()),
                );
                m.insert("skipped".to_string(), Value::Bool(result.skipped));
                (name.clone(), Value::Map(m))
            })
            .collect();
        let env = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut root = BTreeMap::new();
        root.insert("steps".to_string(), Value::Map(steps));
        root.insert("env".to_string(), Value::Map(env));
        Value::Map(root)
    }
}
