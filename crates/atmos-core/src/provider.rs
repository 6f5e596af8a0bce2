//! The component-provider capability: every registered
//! component kind (`terraform`, `helmfile`, `packer`, …) implements this
//! trait and is registered into a `ComponentRegistry` keyed by its type
//! string — the same `Registry<T>` kernel every other pluggable subsystem
//! in this workspace uses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use atmos_process::Cancellation;
use atmos_types::{AuthContext, ComponentConfig, StackMap};

use crate::config::AtmosConfig;

/// `kind -> Arc<dyn ComponentProvider>` registry. Also satisfies
/// `atmos_compiler::RegisteredTypes` for free via that crate's blanket
/// impl over `atmos_registry::Registry<T>`.
pub type ComponentRegistry = atmos_registry::Registry<Arc<dyn ComponentProvider>>;

/// Everything `Execute`/`GenerateArtifacts` needs besides the provider's
/// own type-specific config (`ExecutionContext`).
pub struct ExecutionContext<'a> {
    pub stack: &'a str,
    pub component: &'a str,
    pub config: &'a ComponentConfig,
    pub working_directory: PathBuf,
    pub subcommand: String,
    pub args: Vec<String>,
    pub auth: Option<&'a AuthContext>,
    pub dry_run: bool,
    pub cancellation: Cancellation,
}

/// One registered component kind. A provider knows nothing
/// about the stack compiler or the DAG — it only knows how to enumerate,
/// validate, and execute instances of its own type.
pub trait ComponentProvider: Send + Sync {
    /// The `metadata.type` string this provider registers under.
    fn kind(&self) -> &str;

    /// The broad category a provider belongs to (`"terraform"`,
    /// `"helmfile"`, `"packer"` map to themselves today; a future `helm`
    /// provider might group under `"kubernetes"`), used only for display
    /// grouping in `describe`.
    fn group(&self) -> &str {
        self.kind()
    }

    /// The default component root for this type, honoring any
    /// `atmos.yaml` `components.<type>.base_path` override.
    fn base_path(&self, config: &AtmosConfig) -> PathBuf {
        config.component_base_path(self.kind())
    }

    /// Enumerate every instance of this provider's kind already present
    /// in a compiled stack.
    fn list_components(&self, stack_map: &StackMap, stack: &str) -> Vec<String> {
        stack_map.list_components(stack, self.kind())
    }

    /// Refine and sanity-check a compiled component's configuration
    /// beyond what the compiler already validated structurally.
    fn validate(&self, config: &ComponentConfig) -> Result<()>;

    /// Run a subcommand (`plan`, `apply`, `destroy`, …) against one
    /// component instance. May shell out; reimplementing the tool itself
    /// is explicitly out of scope (non-goals).
    fn execute(&self, ctx: &ExecutionContext) -> Result<()>;

    /// Materialize generated artifacts (`backend.tf.json`, varfiles, …)
    /// ahead of `execute`.
    fn generate_artifacts(&self, ctx: &ExecutionContext) -> Result<()>;

    /// Subcommands this provider accepts, for CLI help text and
    /// unsupported-subcommand error hints.
    fn available_commands(&self) -> Vec<String>;

    /// Optional capability, probed at the call site (design
    /// note): a provider whose type supports JIT source vendoring
    /// implements this; most don't need to override the default `None`.
    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        None
    }
}

/// Per-type source CRUD ("Optionally, a provider implements
/// `SourceProvider`, enabling per-type source CRUD commands"), backed by
/// `atmos-source`'s vendoring primitives rather than reimplementing them.
pub trait SourceProvider: Send + Sync {
    fn ensure(&self, stack: &str, component: &str, config: &ComponentConfig, working_directory: Option<&Path>, opts: &atmos_source::ProvisionOptions)
    -> Result<(atmos_types::TargetPath, atmos_source::ProvisionOutcome)>;
}

/// A blanket `SourceProvider` any component provider can delegate to:
/// dispatches straight through to `atmos_source::ensure_source` using the
/// provider's own `base_path`. Built-in providers that vendor components
/// (terraform, helmfile) construct one of these rather than each
/// reimplementing the same three lines.
pub struct VendoredSourceProvider {
    pub component_type: String,
    pub base_path: PathBuf,
}

impl VendoredSourceProvider {
    pub fn new(component_type: impl Into<String>, base_path: impl Into<PathBuf>) -> Self {
        Self { component_type: component_type.into(), base_path: base_path.into() }
    }
}

impl SourceProvider for VendoredSourceProvider {
    fn ensure(
        &self,
        _stack: &str,
        component: &str,
        config: &ComponentConfig,
        working_directory: Option<&Path>,
        opts: &atmos_source::ProvisionOptions,
    ) -> Result<(atmos_types::TargetPath, atmos_source::ProvisionOutcome)> {
        let source = config.metadata.source.as_ref().ok_or_else(|| {
            atmos_errors::AtmosError::new(atmos_errors::ErrorKind::InvalidConfig, format!("component `{component}` has no metadata.source to vendor"))
                .into()
        })?;
        atmos_source::ensure_source(&self.component_type, component, source, working_directory, &self.base_path, opts)
    }
}

/// Build a `ComponentRegistry` with every built-in provider pre-registered
/// ("init-time self-registration... expose an explicit
/// `RegisterAll()`"), given the config they read their `base_path` from.
pub fn register_builtin_providers(registry: &ComponentRegistry, config: &AtmosConfig) {
    let providers: Vec<Arc<dyn ComponentProvider>> = vec![
        Arc::new(crate::builtin::terraform::TerraformProvider::new(config)),
        Arc::new(crate::builtin::helmfile::HelmfileProvider::new(config)),
        Arc::new(crate::builtin::packer::PackerProvider::new(config)),
    ];
    for provider in providers {
        let kind = provider.kind().to_string();
        let factory_provider = provider.clone();
        registry.register(
            kind,
            Arc::new(move |_kind, _config: &atmos_types::Value| Ok(factory_provider.clone())),
        );
    }
}

/// All registered providers, keyed by kind, for callers (`describe`,
/// `atmos-cli`) that need to iterate rather than dispatch by a single
/// known kind.
pub fn all_providers(registry: &ComponentRegistry) -> BTreeMap<String, Arc<dyn ComponentProvider>> {
    registry
        .list_kinds()
        .into_iter()
        .filter_map(|kind| registry.get(&kind).and_then(|factory| factory(&kind, &atmos_types::Value::Null).ok()).map(|p| (kind, p)))
        .collect()
}
