//! The `helmfile` component provider: writes a per-component values file
//! and shells out to `helmfile`.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use atmos_types::ComponentConfig;

use crate::builtin::shared::dispatch;
use crate::config::AtmosConfig;
use crate::provider::{ComponentProvider, ExecutionContext, SourceProvider, VendoredSourceProvider};

pub struct HelmfileProvider {
    base_path: PathBuf,
    source: VendoredSourceProvider,
}

impl HelmfileProvider {
    pub fn new(config: &AtmosConfig) -> Self {
        let base_path = config.component_base_path("helmfile");
        Self { base_path: base_path.clone(), source: VendoredSourceProvider::new("helmfile", base_path) }
    }
}

impl ComponentProvider for HelmfileProvider {
    fn kind(&self) -> &str {
        "helmfile"
    }

    fn base_path(&self, _config: &AtmosConfig) -> PathBuf {
        self.base_path.clone()
    }

    fn validate(&self, config: &ComponentConfig) -> Result<()> {
        if config.metadata.component.is_none() && config.metadata.kind.is_none() {
            anyhow::bail!("helmfile component is missing both metadata.component and metadata.type");
        }
        Ok(())
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<()> {
        dispatch("helmfile", ctx)
    }

    fn generate_artifacts(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.dry_run || ctx.config.vars.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&ctx.working_directory)
            .with_context(|| format!("failed to create {}", ctx.working_directory.display()))?;
        let path = ctx.working_directory.join(format!("{}.values.yaml", ctx.component));
        let vars = atmos_types::Value::Map(ctx.config.vars.clone());
        let yaml = serde_yaml::to_string(&vars).with_context(|| format!("failed to serialize {}", path.display()))?;
        std::fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))
    }

    fn available_commands(&self) -> Vec<String> {
        ["diff", "apply", "destroy", "sync", "template"].iter().map(|s| s.to_string()).collect()
    }

    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_process::Cancellation;
    use atmos_types::{ComponentMetadata, Value};
    use std::collections::BTreeMap;

    #[test]
    fn generate_artifacts_writes_values_file_only_when_vars_present() {
        let dir = tempfile::tempdir().unwrap();
        let provider = HelmfileProvider::new(&AtmosConfig::default());

        let empty_config = ComponentConfig::default();
        let mut ctx = ExecutionContext {
            stack: "prod",
            component: "app",
            config: &empty_config,
            working_directory: dir.path().to_path_buf(),
            subcommand: "apply".to_string(),
            args: Vec::new(),
            auth: None,
            dry_run: false,
            cancellation: Cancellation::default(),
        };
        provider.generate_artifacts(&ctx).unwrap();
        assert!(!dir.path().join("app.values.yaml").exists());

        let mut vars = BTreeMap::new();
        vars.insert("replicas".to_string(), Value::Number(atmos_types::Number::Int(3)));
        let config = ComponentConfig { vars, ..Default::default() };
        ctx.config = &config;
        provider.generate_artifacts(&ctx).unwrap();
        assert!(dir.path().join("app.values.yaml").exists());
    }

    #[test]
    fn validate_requires_component_or_type() {
        let provider = HelmfileProvider::new(&AtmosConfig::default());
        assert!(provider.validate(&ComponentConfig::default()).is_err());
        let config = ComponentConfig {
            metadata: ComponentMetadata { kind: Some("helmfile".to_string()), ..Default::default() },
            ..Default::default()
        };
        assert!(provider.validate(&config).is_ok());
    }
}
