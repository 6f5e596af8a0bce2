//! Backs `!terraform.output`/`!terraform.state` (inline YAML
//! functions) by shelling out to the `terraform` binary rather than
//! reimplementing state-file inspection (non-goals). Implements
//! `atmos_template::RemoteStateResolver`, the seam that crate defines for
//! exactly this purpose.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use atmos_process::RunOptions;
use atmos_template::RemoteStateResolver;
use atmos_types::{AuthContext, Value};

use crate::config::AtmosConfig;

pub struct CoreRemoteStateResolver {
    config: Arc<AtmosConfig>,
}

impl CoreRemoteStateResolver {
    pub fn new(config: Arc<AtmosConfig>) -> Self {
        Self { config }
    }

    fn run_terraform_output(&self, component: &str, auth: &AuthContext) -> Result<Value> {
        let working_directory = self.config.component_base_path("terraform").join(component);
        let mut opts = RunOptions::new().in_dir(&working_directory);
        for (k, v) in &auth.env {
            opts = opts.with_env(k, v);
        }
        let output = atmos_process::run_checked("terraform", &["output", "-json"], &opts)
            .with_context(|| format!("running `terraform output -json` for {component}"))?;
        serde_json::from_str::<serde_json::Value>(&output.stdout)
            .with_context(|| format!("parsing terraform output for {component}"))
            .map(json_to_value)
    }
}

impl RemoteStateResolver for CoreRemoteStateResolver {
    fn terraform_output(&self, component: &str, _stack: Option<&str>, auth: &AuthContext) -> Result<Value> {
        self.run_terraform_output(component, auth)
    }

    fn terraform_state(&self, component: &str, output: &str, stack: Option<&str>, auth: &AuthContext) -> Result<Value> {
        let outputs = self.run_terraform_output(component, auth)?;
        outputs
            .as_map()
            .and_then(|m| m.get(output))
            .and_then(|entry| entry.as_map())
            .and_then(|m| m.get("value"))
            .cloned()
            .ok_or_else(|| {
                atmos_errors::AtmosError::new(
                    atmos_errors::ErrorKind::NotFound,
                    format!("no terraform output named `{output}` for component `{component}`"),
                )
                .with_context("stack", stack.unwrap_or("-"))
                .into()
            })
    }
}

fn json_to_value(value: serde_json::Value) -> Value {
    serde_json::from_value(value).unwrap_or(Value::Null)
}
