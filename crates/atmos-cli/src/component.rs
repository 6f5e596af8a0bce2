//! Manual parsing and dispatch for the dynamic `<type> <verb> <component>
//! ...` command family that `clap`'s derive macros can't model
//! as a closed subcommand set, since `<type>` is whatever kind
//! `atmos-core` registered at bootstrap.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use atmos_auth::AuthCallContext;
use atmos_core::{AtmosCore, ExecutionContext};
use atmos_errors::{AtmosError, ErrorKind};
use atmos_process::Cancellation;
use atmos_source::ProvisionOptions;
use atmos_types::ComponentConfig;

/// A flat `--key value` / `--key=value` / `--flag` tail, plus whatever
/// bare words came with it, in order.
struct ParsedArgs {
    positionals: Vec<String>,
    flags: BTreeMap<String, Option<String>>,
}

fn parse_tail(raw: &[String]) -> ParsedArgs {
    let mut positionals = Vec::new();
    let mut flags = BTreeMap::new();
    let mut i = 0;
    while i < raw.len() {
        let arg = &raw[i];
        if let Some(key) = arg.strip_prefix("--") {
            if let Some((k, v)) = key.split_once('=') {
                flags.insert(k.to_string(), Some(v.to_string()));
            } else if i + 1 < raw.len() && !raw[i + 1].starts_with("--") {
                flags.insert(key.to_string(), Some(raw[i + 1].clone()));
                i += 1;
            } else {
                flags.insert(key.to_string(), None);
            }
        } else {
            positionals.push(arg.clone());
        }
        i += 1;
    }
    ParsedArgs { positionals, flags }
}

impl ParsedArgs {
    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(|v| v.as_deref())
    }

    fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }
}

pub enum ComponentInvocation {
    /// `<type> <subcommand> <component> --stack <stack> [-- args]`
    Execute { kind: String, subcommand: String, component: String, stack: String, dry_run: bool, args: Vec<String> },
    Backend { kind: String, action: BackendAction, component: String, stack: String, force: bool },
    Source { kind: String, action: SourceAction, component: String, stack: String },
    SourceCache { kind: String, action: CacheAction },
}

pub enum BackendAction {
    Create,
    List,
    Describe,
    Delete,
}

pub enum SourceAction {
    Create,
    Update,
    List,
    Describe,
    Delete,
}

pub enum CacheAction {
    List,
    Prune,
    Clear,
    Refresh,
}

pub fn parse_component_invocation(raw: &[String]) -> Result<ComponentInvocation> {
    let parsed = parse_tail(raw);
    let mut positionals = parsed.positionals.iter();
    let kind = positionals.next().cloned().context("expected `<type> <verb> ...`")?;
    let verb = positionals.next().cloned().context("expected a verb after the component type")?;

    let stack = || -> Result<String> { parsed.flag("stack").map(String::from).context("--stack is required") };

    match verb.as_str() {
        "backend" => {
            let action_word = positionals.next().cloned().context("expected backend create|list|describe|delete")?;
            let action = match action_word.as_str() {
                "create" => BackendAction::Create,
                "list" => BackendAction::List,
                "describe" => BackendAction::Describe,
                "delete" => BackendAction::Delete,
                other => bail!("unknown backend action `{other}`"),
            };
            let component = positionals.next().cloned().unwrap_or_default();
            Ok(ComponentInvocation::Backend { kind, action, component, stack: stack()?, force: parsed.has_flag("force") })
        }
        "source" => {
            let action_word = positionals.next().cloned().context("expected source create|update|list|describe|delete|cache")?;
            if action_word == "cache" {
                let cache_word = positionals.next().cloned().context("expected cache list|prune|clear|refresh")?;
                let action = match cache_word.as_str() {
                    "list" => CacheAction::List,
                    "prune" => CacheAction::Prune,
                    "clear" => CacheAction::Clear,
                    "refresh" => CacheAction::Refresh,
                    other => bail!("unknown source cache action `{other}`"),
                };
                return Ok(ComponentInvocation::SourceCache { kind, action });
            }
            let action = match action_word.as_str() {
                "create" => SourceAction::Create,
                "update" => SourceAction::Update,
                "list" => SourceAction::List,
                "describe" => SourceAction::Describe,
                "delete" => SourceAction::Delete,
                other => bail!("unknown source action `{other}`"),
            };
            let component = positionals.next().cloned().unwrap_or_default();
            Ok(ComponentInvocation::Source { kind, action, component, stack: stack()? })
        }
        subcommand => {
            let component = positionals.next().cloned().context("expected a component name")?;
            let rest: Vec<String> = positionals.cloned().collect();
            Ok(ComponentInvocation::Execute {
                kind,
                subcommand: subcommand.to_string(),
                component,
                stack: stack()?,
                dry_run: parsed.has_flag("dry-run"),
                args: rest,
            })
        }
    }
}

pub fn dispatch_component(core: &AtmosCore, invocation: ComponentInvocation, identity: Option<String>, cancellation: Cancellation) -> Result<()> {
    match invocation {
        ComponentInvocation::Execute { kind, subcommand, component, stack, dry_run, args } => {
            execute_component(core, &kind, &subcommand, &component, &stack, dry_run, args, identity, cancellation)
        }
        ComponentInvocation::Backend { kind, action, component, stack, force } => backend_command(core, &kind, action, &component, &stack, force, identity, cancellation),
        ComponentInvocation::Source { kind, action, component, stack } => source_command(core, &kind, action, &component, &stack, identity, cancellation),
        ComponentInvocation::SourceCache { kind, action } => cache_command(&kind, action, cancellation),
    }
}

fn provider_and_config(
    core: &AtmosCore,
    kind: &str,
    component: &str,
    stack: &str,
    identity: Option<String>,
    cancellation: Cancellation,
) -> Result<(Arc<dyn atmos_core::ComponentProvider>, ComponentConfig, PathBuf, Option<atmos_types::AuthContext>)> {
    let provider = core
        .providers
        .new_instance(kind, &atmos_types::Value::Null)
        .with_context(|| format!("no component provider registered for type `{kind}`"))?;

    let compiled = core.compile_stacks(&[stack.to_string()], identity.clone(), cancellation.clone());
    if !compiled.outcome.is_success() {
        let summary = compiled.outcome.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
        bail!("stack compilation failed:\n{summary}");
    }

    let config = compiled
        .outcome
        .stack_map
        .get(stack, kind, component)
        .cloned()
        .ok_or_else(|| AtmosError::new(ErrorKind::NotFound, format!("no component `{kind}/{component}` in stack `{stack}`")))?;

    let working_directory = provider.base_path(&core.config).join(component);

    let auth = match identity {
        Some(name) => {
            let (auth, _info) = core.auth_manager.authenticate(&name, &AuthCallContext { cancellation })?;
            Some(auth)
        }
        None => None,
    };

    Ok((provider, config, working_directory, auth))
}

fn execute_component(
    core: &AtmosCore,
    kind: &str,
    subcommand: &str,
    component: &str,
    stack: &str,
    dry_run: bool,
    args: Vec<String>,
    identity: Option<String>,
    cancellation: Cancellation,
) -> Result<()> {
    let (provider, config, working_directory, auth) = provider_and_config(core, kind, component, stack, identity, cancellation.clone())?;
    provider.validate(&config)?;

    if let Some(source_provider) = provider.as_source_provider() {
        let opts = ProvisionOptions { cancellation: cancellation.clone(), ..Default::default() };
        source_provider.ensure(stack, component, &config, None, &opts)?;
    }

    let ctx = ExecutionContext {
        stack,
        component,
        config: &config,
        working_directory,
        subcommand: subcommand.to_string(),
        args,
        auth: auth.as_ref(),
        dry_run,
        cancellation,
    };

    provider.generate_artifacts(&ctx)?;
    provider.execute(&ctx)
}

fn backend_command(
    core: &AtmosCore,
    kind: &str,
    action: BackendAction,
    component: &str,
    stack: &str,
    force: bool,
    identity: Option<String>,
    cancellation: Cancellation,
) -> Result<()> {
    match action {
        BackendAction::List => {
            let stack_map = super_list_stack(core, kind, stack, identity, cancellation)?;
            for name in stack_map.list_components(stack, kind) {
                if stack_map.get(stack, kind, &name).and_then(|c| c.backend.as_ref()).is_some() {
                    println!("{name}");
                }
            }
            Ok(())
        }
        BackendAction::Describe => {
            let (_provider, config, _dir, _auth) = provider_and_config(core, kind, component, stack, identity, cancellation)?;
            let rendered = match &config.backend {
                Some(backend) => serde_yaml::to_string(backend)?,
                None => "null\n".to_string(),
            };
            print!("{rendered}");
            Ok(())
        }
        BackendAction::Create => {
            let (provider, config, working_directory, auth) = provider_and_config(core, kind, component, stack, identity, cancellation.clone())?;
            let ctx = ExecutionContext {
                stack,
                component,
                config: &config,
                working_directory,
                subcommand: "backend-create".to_string(),
                args: Vec::new(),
                auth: auth.as_ref(),
                dry_run: false,
                cancellation,
            };
            provider.generate_artifacts(&ctx)
        }
        BackendAction::Delete => {
            let (_provider, _config, working_directory, _auth) = provider_and_config(core, kind, component, stack, identity, cancellation)?;
            let candidates = ["backend.tf.json"];
            let mut removed = false;
            for name in candidates {
                let path = working_directory.join(name);
                if path.exists() {
                    if !force {
                        bail!("{} exists; pass --force to delete it", path.display());
                    }
                    std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
                    removed = true;
                }
            }
            if !removed {
                println!("no backend artifacts to remove for {kind}/{component}");
            }
            Ok(())
        }
    }
}

fn super_list_stack(core: &AtmosCore, _kind: &str, stack: &str, identity: Option<String>, cancellation: Cancellation) -> Result<atmos_types::StackMap> {
    let compiled = core.compile_stacks(&[stack.to_string()], identity, cancellation);
    if !compiled.outcome.is_success() {
        let summary = compiled.outcome.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
        bail!("stack compilation failed:\n{summary}");
    }
    Ok(compiled.outcome.stack_map)
}

fn source_command(core: &AtmosCore, kind: &str, action: SourceAction, component: &str, stack: &str, identity: Option<String>, cancellation: Cancellation) -> Result<()> {
    match action {
        SourceAction::List => {
            let entries = atmos_source::cache::list(kind)?;
            for entry in entries {
                println!("{}", entry.bare_repo_dir.display());
            }
            Ok(())
        }
        SourceAction::Create | SourceAction::Update => {
            let (provider, config, _dir, _auth) = provider_and_config(core, kind, component, stack, identity, cancellation.clone())?;
            let source_provider = provider
                .as_source_provider()
                .ok_or_else(|| AtmosError::new(ErrorKind::UnsupportedKind, format!("component type `{kind}` does not support source vendoring")))?;
            let working_directory = config
                .provision
                .get("working_directory")
                .and_then(|v| v.as_str())
                .map(PathBuf::from);
            let opts = ProvisionOptions { force: matches!(action, SourceAction::Update), cancellation, ..Default::default() };
            let (target, outcome) = source_provider.ensure(stack, component, &config, working_directory.as_deref(), &opts)?;
            println!("{:?} at {}", outcome, target.path.display());
            Ok(())
        }
        SourceAction::Describe => {
            let (provider, config, _dir, _auth) = provider_and_config(core, kind, component, stack, identity, cancellation)?;
            let base_path = provider.base_path(&core.config);
            println!("base_path: {}", base_path.display());
            if let Some(source) = &config.metadata.source {
                println!("uri: {}", source.uri());
                if let Some(version) = source.version() {
                    println!("version: {version}");
                }
            }
            Ok(())
        }
        SourceAction::Delete => {
            let (provider, _config, _dir, _auth) = provider_and_config(core, kind, component, stack, identity, cancellation)?;
            let target = provider.base_path(&core.config).join(component);
            if target.exists() {
                std::fs::remove_dir_all(&target).with_context(|| format!("removing {}", target.display()))?;
            }
            println!("removed {}", target.display());
            Ok(())
        }
    }
}

fn cache_command(kind: &str, action: CacheAction, cancellation: Cancellation) -> Result<()> {
    let default_ttl = Duration::from_secs(24 * 3600);
    match action {
        CacheAction::List => {
            for entry in atmos_source::cache::list(kind)? {
                println!("{}\tstale={}", entry.bare_repo_dir.display(), entry.is_stale(default_ttl));
            }
            Ok(())
        }
        CacheAction::Prune => {
            let removed = atmos_source::cache::prune(kind, default_ttl)?;
            println!("pruned {removed} stale cache entr{}", if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
        CacheAction::Clear => {
            atmos_source::cache::clear(kind)?;
            println!("cleared source cache for `{kind}`");
            Ok(())
        }
        CacheAction::Refresh => {
            let refreshed = atmos_source::cache::refresh(kind, &cancellation)?;
            println!("refreshed {refreshed} cache entr{}", if refreshed == 1 { "y" } else { "ies" });
            Ok(())
        }
    }
}
