//! The `packer` component provider: writes a per-component variables file
//! and shells out to `packer`. Packer has no notion of a remote backend,
//! so `generate_artifacts` only ever writes the varfile.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use atmos_types::ComponentConfig;

use crate::builtin::shared::dispatch;
use crate::config::AtmosConfig;
use crate::provider::{ComponentProvider, ExecutionContext, SourceProvider, VendoredSourceProvider};

pub struct PackerProvider {
    base_path: PathBuf,
    source: VendoredSourceProvider,
}

impl PackerProvider {
    pub fn new(config: &AtmosConfig) -> Self {
        let base_path = config.component_base_path("packer");
        Self { base_path: base_path.clone(), source: VendoredSourceProvider::new("packer", base_path) }
    }
}

impl ComponentProvider for PackerProvider {
    fn kind(&self) -> &str {
        "packer"
    }

    fn base_path(&self, _config: &AtmosConfig) -> PathBuf {
        self.base_path.clone()
    }

    fn validate(&self, config: &ComponentConfig) -> Result<()> {
        if config.metadata.component.is_none() && config.metadata.kind.is_none() {
            anyhow::bail!("packer component is missing both metadata.component and metadata.type");
        }
        Ok(())
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<()> {
        dispatch("packer", ctx)
    }

    fn generate_artifacts(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.dry_run || ctx.config.vars.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&ctx.working_directory)
            .with_context(|| format!("failed to create {}", ctx.working_directory.display()))?;
        let path = ctx.working_directory.join(format!("{}.vars.json", ctx.component));
        let vars = atmos_types::Value::Map(ctx.config.vars.clone());
        let json = serde_json::to_string_pretty(&vars).with_context(|| format!("failed to serialize {}", path.display()))?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    fn available_commands(&self) -> Vec<String> {
        ["build", "validate", "fix", "inspect"].iter().map(|s| s.to_string()).collect()
    }

    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_commands() {
        let provider = PackerProvider::new(&AtmosConfig::default());
        assert_eq!(provider.kind(), "packer");
        assert!(provider.available_commands().contains(&"build".to_string()));
    }
}
