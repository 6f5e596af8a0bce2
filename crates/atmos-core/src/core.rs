//! `AtmosCore`: the facade tying configuration, registries, the stack
//! compiler, the dependency graph, auth, and the workflow engine together
//! ("init-time self-registration... expose an
//! explicit `RegisterAll()` rather than relying on import side effects").

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use atmos_auth::{AuthCallContext, AuthManager, AuthResolverRegistry, CredentialStore, EcrLoginHook};
use atmos_compiler::{CompiledStacks, StackCompiler};
use atmos_dag::DependencyGraph;
use atmos_process::Cancellation;
use atmos_template::TemplateEngine;
use atmos_types::StackMap;
use atmos_workflow::{StepContext, StepRegistry, WorkflowEngine};

use crate::auth_bridge::CoreAuthResolver;
use crate::builtin_auth::{register_builtin_auth_resolvers, AwsCliEcrTokenFetcher};
use crate::config::AtmosConfig;
use crate::provider::{register_builtin_providers, ComponentRegistry};
use crate::remote_state::CoreRemoteStateResolver;

/// Everything a command needs, built once per invocation and shared across
/// the handful of operations (compile, describe, execute, workflow) that
/// invocation touches.
pub struct AtmosCore {
    pub config: Arc<AtmosConfig>,
    pub base_path: PathBuf,
    pub providers: Arc<ComponentRegistry>,
    pub auth_resolvers: Arc<AuthResolverRegistry>,
    pub steps: Arc<StepRegistry>,
    pub auth_manager: Arc<AuthManager>,
}

impl AtmosCore {
    /// Load configuration from `base_path` and register every built-in
    /// component provider, auth resolver kind, and workflow step kind.
    /// Mirrors the teacher's explicit `RegisterAll` rather than relying on
    /// `ctor`-style link-time side effects, so test code can build a fresh
    /// registry set per case.
    pub fn bootstrap(base_path: impl Into<PathBuf>) -> Result<Self> {
        Self::bootstrap_with_config_path(base_path, None)
    }

    /// Like [`Self::bootstrap`], but loads `atmos.yaml` from `config_path`
    /// instead of `<base_path>/atmos.yaml` when given. Backs
    /// `ATMOS_CLI_CONFIG_PATH`.
    pub fn bootstrap_with_config_path(base_path: impl Into<PathBuf>, config_path: Option<&std::path::Path>) -> Result<Self> {
        let base_path = base_path.into();
        let config = Arc::new(match config_path {
            Some(path) => AtmosConfig::load_from_file(path)?,
            None => AtmosConfig::load_from_workspace(&base_path)?,
        });

        let providers = Arc::new(ComponentRegistry::new());
        register_builtin_providers(&providers, &config);

        let auth_resolvers = Arc::new(AuthResolverRegistry::new());
        register_builtin_auth_resolvers(&auth_resolvers);

        let steps = Arc::new(StepRegistry::new());
        atmos_workflow::register_builtins(&steps);

        let store = CredentialStore::new().with_cache_dir(atmos_xdg::cache_dir().join("auth"));
        let auth_manager = Arc::new(
            AuthManager::new(config.auth.clone(), auth_resolvers.clone(), store)
                .with_posthook(Arc::new(EcrLoginHook::new(AwsCliEcrTokenFetcher { registry: String::new() }))),
        );

        Ok(Self { config, base_path, providers, auth_resolvers, steps, auth_manager })
    }

    /// Build the template engine, wired with the remote-state resolver
    /// that dispatches `!terraform.output`/`!terraform.state` to the
    /// `terraform` component provider.
    pub fn template_engine(&self) -> TemplateEngine {
        TemplateEngine::new(&self.base_path).with_resolver(Arc::new(CoreRemoteStateResolver::new(self.config.clone())))
    }

    /// Compile every named stack, authenticating as `identity` (if any)
    /// once per stack.
    pub fn compile_stacks(&self, stack_names: &[String], identity: Option<String>, cancellation: Cancellation) -> CompiledStacks {
        let roots = vec![self.base_path.join(&self.config.stacks.base_path)];
        let auth_resolver = Arc::new(CoreAuthResolver::new(identity, self.auth_manager.clone(), AuthCallContext { cancellation }));

        StackCompiler::new(roots)
            .with_template_engine(self.template_engine())
            .with_registered_types(self.providers.clone())
            .with_auth_resolver(auth_resolver)
            .compile_stacks(stack_names)
    }

    pub fn dependency_graph(&self, stack_map: &StackMap) -> Result<DependencyGraph> {
        DependencyGraph::build(stack_map)
    }

    pub fn workflow_engine(&self) -> WorkflowEngine {
        WorkflowEngine::new(self.steps.clone(), Arc::new(self.template_engine()))
    }

    pub fn new_step_context(&self, prompter: Arc<dyn atmos_workflow::Prompter>, reporter: Arc<dyn atmos_workflow::Reporter>) -> StepContext {
        StepContext::new(self.base_path.clone(), prompter, reporter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_registers_every_builtin_provider() {
        let dir = tempfile::tempdir().unwrap();
        let core = AtmosCore::bootstrap(dir.path()).unwrap();
        for kind in ["terraform", "helmfile", "packer"] {
            assert!(core.providers.get(kind).is_some(), "missing builtin provider: {kind}");
        }
    }

    #[test]
    fn bootstrap_registers_every_builtin_auth_kind() {
        let dir = tempfile::tempdir().unwrap();
        let core = AtmosCore::bootstrap(dir.path()).unwrap();
        for kind in ["static", "aws-sso", "aws/assume-role"] {
            assert!(core.auth_resolvers.get(kind).is_some(), "missing builtin auth kind: {kind}");
        }
    }

    #[test]
    fn bootstrap_registers_every_builtin_step_kind() {
        let dir = tempfile::tempdir().unwrap();
        let core = AtmosCore::bootstrap(dir.path()).unwrap();
        assert!(core.steps.get("atmos").is_some());
        assert!(core.steps.get("shell").is_some());
    }
}
