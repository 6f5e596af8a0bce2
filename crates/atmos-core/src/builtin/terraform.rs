//! The `terraform` component provider. Generates
//! `backend.tf.json` and a `.tfvars.json` varfile, then shells out to the
//! `terraform` binary for every other subcommand.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use atmos_types::ComponentConfig;

use crate::builtin::shared::dispatch;
use crate::config::AtmosConfig;
use crate::provider::{ComponentProvider, ExecutionContext, SourceProvider, VendoredSourceProvider};

pub struct TerraformProvider {
    base_path: PathBuf,
    source: VendoredSourceProvider,
}

impl TerraformProvider {
    pub fn new(config: &AtmosConfig) -> Self {
        let base_path = config.component_base_path("terraform");
        Self { base_path: base_path.clone(), source: VendoredSourceProvider::new("terraform", base_path) }
    }
}

impl ComponentProvider for TerraformProvider {
    fn kind(&self) -> &str {
        "terraform"
    }

    fn base_path(&self, _config: &AtmosConfig) -> PathBuf {
        self.base_path.clone()
    }

    fn validate(&self, config: &ComponentConfig) -> Result<()> {
        if config.metadata.component.is_none() && config.metadata.kind.is_none() {
            anyhow::bail!("terraform component is missing both metadata.component and metadata.type");
        }
        Ok(())
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<()> {
        dispatch("terraform", ctx)
    }

    fn generate_artifacts(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.dry_run {
            return Ok(());
        }
        std::fs::create_dir_all(&ctx.working_directory)
            .with_context(|| format!("failed to create {}", ctx.working_directory.display()))?;

        if let Some(backend) = &ctx.config.backend {
            let path = ctx.working_directory.join("backend.tf.json");
            let mut root = std::collections::BTreeMap::new();
            let mut terraform_block = std::collections::BTreeMap::new();
            terraform_block.insert("backend".to_string(), backend.clone());
            root.insert("terraform".to_string(), atmos_types::Value::Map(terraform_block));
            write_json(&path, &atmos_types::Value::Map(root))?;
        }

        if !ctx.config.vars.is_empty() {
            let path = ctx.working_directory.join(format!("{}.auto.tfvars.json", ctx.component));
            let vars = atmos_types::Value::Map(ctx.config.vars.clone());
            write_json(&path, &vars)?;
        }

        if let Some(providers) = &ctx.config.providers {
            let path = ctx.working_directory.join("providers_override.tf.json");
            let mut root = std::collections::BTreeMap::new();
            root.insert("provider".to_string(), providers.clone());
            write_json(&path, &atmos_types::Value::Map(root))?;
        }

        Ok(())
    }

    fn available_commands(&self) -> Vec<String> {
        ["plan", "apply", "destroy", "init", "output", "refresh", "validate"].iter().map(|s| s.to_string()).collect()
    }

    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        Some(&self.source)
    }
}

fn write_json(path: &std::path::Path, value: &atmos_types::Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_process::Cancellation;
    use atmos_types::{ComponentMetadata, Number, Value};
    use std::collections::BTreeMap;

    fn provider() -> TerraformProvider {
        TerraformProvider::new(&AtmosConfig::default())
    }

    #[test]
    fn kind_and_commands() {
        let provider = provider();
        assert_eq!(provider.kind(), "terraform");
        assert!(provider.available_commands().contains(&"plan".to_string()));
    }

    #[test]
    fn validate_requires_component_or_type() {
        let provider = provider();
        assert!(provider.validate(&ComponentConfig::default()).is_err());

        let config = ComponentConfig {
            metadata: ComponentMetadata { component: Some("vpc".to_string()), ..Default::default() },
            ..Default::default()
        };
        assert!(provider.validate(&config).is_ok());
    }

    #[test]
    fn generate_artifacts_writes_backend_and_varfile() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider();

        let mut vars = BTreeMap::new();
        vars.insert("cidr".to_string(), Value::String("10.0.0.0/16".to_string()));
        vars.insert("count".to_string(), Value::Number(Number::Int(3)));

        let mut backend = BTreeMap::new();
        let mut s3 = BTreeMap::new();
        s3.insert("bucket".to_string(), Value::String("tfstate".to_string()));
        backend.insert("s3".to_string(), Value::Map(s3));

        let config = ComponentConfig { backend: Some(Value::Map(backend)), vars, ..Default::default() };

        let ctx = ExecutionContext {
            stack: "prod",
            component: "vpc",
            config: &config,
            working_directory: dir.path().to_path_buf(),
            subcommand: "plan".to_string(),
            args: Vec::new(),
            auth: None,
            dry_run: false,
            cancellation: Cancellation::default(),
        };

        provider.generate_artifacts(&ctx).unwrap();
        assert!(dir.path().join("backend.tf.json").exists());
        assert!(dir.path().join("vpc.auto.tfvars.json").exists());

        let varfile = std::fs::read_to_string(dir.path().join("vpc.auto.tfvars.json")).unwrap();
        assert!(varfile.contains("10.0.0.0/16"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider();
        let mut backend = BTreeMap::new();
        backend.insert("s3".to_string(), Value::Map(BTreeMap::new()));
        let config = ComponentConfig { backend: Some(Value::Map(backend)), ..Default::default() };

        let ctx = ExecutionContext {
            stack: "prod",
            component: "vpc",
            config: &config,
            working_directory: dir.path().to_path_buf(),
            subcommand: "plan".to_string(),
            args: Vec::new(),
            auth: None,
            dry_run: true,
            cancellation: Cancellation::default(),
        };
        provider.generate_artifacts(&ctx).unwrap();
        assert!(!dir.path().join("backend.tf.json").exists());
    }
}
