//! `atmos.yaml` global configuration: a typed `serde`-derived
//! struct tree loaded the way `shipper::config::ShipperConfig` loads
//! `.shipper.toml` (`load_from_file`/`load_from_workspace`), but with a
//! `validate()` that collects every problem instead of failing on the
//! first: a collect-all-errors pass.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::AuthConfig;

pub const CONFIG_FILE: &str = "atmos.yaml";

/// Global Atmos configuration ("sections `components`,
/// `auth.{providers, identities}`, `stacks.{base_path, included_paths,
/// excluded_paths}`, `toolchain.registries[]`, `provision.source`,
/// `settings.terminal.mask`, `settings.cache.sources`").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtmosConfig {
    #[serde(default)]
    pub components: BTreeMap<String, ComponentTypeConfig>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub stacks: StacksConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Per-type component configuration (`components`); `base_path`
/// overrides a provider's default `components/<type>` root, and anything
/// else a provider needs rides along in `extra` rather than widening this
/// struct per provider kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentTypeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, atmos_types::Value>,
}

/// `stacks.{base_path, included_paths, excluded_paths}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksConfig {
    #[serde(default = "default_stacks_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub included_paths: Vec<String>,
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

impl Default for StacksConfig {
    fn default() -> Self {
        Self { base_path: default_stacks_base_path(), included_paths: Vec::new(), excluded_paths: Vec::new() }
    }
}

fn default_stacks_base_path() -> String {
    "stacks".to_string()
}

/// `toolchain.registries[]`: extra registries a component's tool (e.g. a
/// private Terraform module registry or Helm chart repo) may need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub registries: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub url: String,
}

/// `provision.source`: defaults handed to every `ensure_source` call
/// unless a command overrides them with `--ttl`/`--no-cache`/`--force`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub source: SourceProvisionConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self { source: SourceProvisionConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceProvisionConfig {
    #[serde(default = "default_ttl")]
    pub ttl: String,
    #[serde(default)]
    pub no_cache: bool,
}

impl Default for SourceProvisionConfig {
    fn default() -> Self {
        Self { ttl: default_ttl(), no_cache: false }
    }
}

impl SourceProvisionConfig {
    pub fn ttl_duration(&self) -> Result<Duration> {
        humantime::parse_duration(&self.ttl).with_context(|| format!("invalid provision.source.ttl: {}", self.ttl))
    }
}

fn default_ttl() -> String {
    "24h".to_string()
}

/// `settings.{terminal, cache}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub terminal: TerminalSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// A masking plug point for secret-shaped values in
/// rendered output. `mask` lists the dotted/JSONPath fields to redact; the
/// redaction itself is a CLI-layer rendering concern (out of the core per
/// non-goals around UI rendering), so this only carries the
/// declared field list through `atmos.yaml` for whatever renders output to
/// consume. Left undecided beyond "implement the config plug point, do
/// not wire a masker" (see DESIGN.md).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalSettings {
    #[serde(default)]
    pub mask: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<String>,
}

impl AtmosConfig {
    /// Load from an explicit path (`ATMOS_CLI_CONFIG_PATH`).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: AtmosConfig =
            serde_yaml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Search `base_path` for `atmos.yaml` (`ATMOS_BASE_PATH`
    /// default discovery); returns the default config when absent, since
    /// every Atmos subsystem tolerates an empty config (no components, no
    /// auth, default stack layout).
    pub fn load_from_workspace(base_path: &Path) -> Result<Self> {
        let path = base_path.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    /// Collect every configuration problem rather than stopping at the
    /// first; returns a single `ErrInvalidConfig` whose `Context` block
    /// lists every issue.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.stacks.base_path.trim().is_empty() {
            problems.push("stacks.base_path must not be empty".to_string());
        }

        for entry in &self.toolchain.registries {
            if entry.name.trim().is_empty() {
                problems.push("toolchain.registries[] entry has an empty name".to_string());
            }
            if entry.url.trim().is_empty() {
                problems.push(format!("toolchain.registries[{}].url must not be empty", entry.name));
            }
        }

        if let Err(err) = self.provision.source.ttl_duration() {
            problems.push(err.to_string());
        }

        for (name, identity) in &self.auth.identities {
            if identity.kind.trim().is_empty() {
                problems.push(format!("auth.identities.{name}.type must not be empty"));
            }
            if let Some(via) = &identity.via {
                if !self.auth.identities.contains_key(via) && !self.auth.providers.contains_key(via) {
                    problems.push(format!("auth.identities.{name}.via references unknown identity/provider `{via}`"));
                }
            } else {
                problems.push(format!("auth.identities.{name} has no `via`; every identity must chain to a provider"));
            }
        }

        for (name, provider) in &self.auth.providers {
            if provider.kind.trim().is_empty() {
                problems.push(format!("auth.providers.{name}.type must not be empty"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            let mut err = AtmosError::new(ErrorKind::InvalidConfig, "atmos.yaml failed validation");
            for (i, problem) in problems.iter().enumerate() {
                err = err.with_context(format!("problem[{i}]"), problem);
            }
            Err(err.with_hint("fix every listed problem; atmos.yaml validation reports all issues at once").into())
        }
    }

    /// The default component root for `kind`, honoring a per-type
    /// `base_path` override (`BasePath(AtmosConfig)`).
    pub fn component_base_path(&self, kind: &str) -> PathBuf {
        match self.components.get(kind).and_then(|c| c.base_path.as_deref()) {
            Some(base) => PathBuf::from(base),
            None => PathBuf::from("components").join(kind),
        }
    }
}
