//! The `atmos` binary: a thin presentation layer over `atmos-core`. The
//! core exposes a small facade; the CLI only parses arguments, wires up
//! the facade, and renders its results.
//!
//! `<type>` in the component command family is not a fixed set - it is
//! whatever `atmos-core` registered at bootstrap - so `clap`'s derive
//! macros cannot model it as a closed enum. Fixed surfaces (`describe`,
//! `workflow`, `auth`) are ordinary derived subcommands; the dynamic
//! `<type> <verb> <component> ...` / `<type> backend ...` / `<type> source
//! ...` surface rides in on an `external_subcommand` catch-all and is
//! parsed by hand below.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use atmos_auth::{AuthCallContext, FirstMatchPicker};
use atmos_core::{describe_affected, describe_component, describe_dependents, describe_stacks, AtmosCore, DescribeFormat};
use atmos_dag::DependencyGraph;
use atmos_errors::AtmosError;
use atmos_process::Cancellation;
use atmos_types::{ComponentKey, TagMode, WorkflowDefinition};
use atmos_workflow::{Reporter, StdinPrompter, TerminalReporter};

mod component;

use component::{dispatch_component, parse_component_invocation};

#[derive(Parser, Debug)]
#[command(name = "atmos", version, about = "Orchestrates Terraform, Helmfile, and Packer components across stacks")]
struct Cli {
    /// Workspace root to search for `atmos.yaml` and `stacks/`.
    #[arg(long, global = true, env = "ATMOS_BASE_PATH", default_value = ".")]
    base_path: PathBuf,

    /// Explicit `atmos.yaml` path, overriding `<base-path>/atmos.yaml`.
    #[arg(long, global = true, env = "ATMOS_CLI_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Identity to authenticate as. Bare `--identity` with no value asks
    /// for an interactive pick among tag-filtered candidates.
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "")]
    identity: Option<String>,

    #[arg(long = "tags", global = true, value_delimiter = ',')]
    tags: Vec<String>,

    #[arg(long = "tag-mode", global = true, value_enum, default_value = "any")]
    tag_mode: CliTagMode,

    /// Never block on a terminal prompt; fail with `TtyRequired` instead.
    #[arg(long, global = true, env = "ATMOS_NO_INPUT")]
    no_input: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliTagMode {
    Any,
    All,
}

impl From<CliTagMode> for TagMode {
    fn from(mode: CliTagMode) -> Self {
        match mode {
            CliTagMode::Any => TagMode::Any,
            CliTagMode::All => TagMode::All,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliFormat {
    Yaml,
    Json,
}

impl From<CliFormat> for DescribeFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Yaml => DescribeFormat::Yaml,
            CliFormat::Json => DescribeFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render compiled stack/component configuration.
    Describe {
        #[command(subcommand)]
        target: DescribeTarget,
    },
    /// Run a named workflow file.
    Workflow {
        name: String,
        #[arg(long)]
        stack: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect and manage cached credentials.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// `<type> <verb> <component> --stack <stack> ...`, `<type> backend
    /// ...`, or `<type> source ...` - dispatched to whatever component
    /// provider kind is registered under `<type>`.
    #[command(external_subcommand)]
    Component(Vec<String>),
}

#[derive(Subcommand, Debug)]
enum DescribeTarget {
    Stacks {
        #[arg(long = "query")]
        query: Option<String>,
        #[arg(long, value_enum, default_value = "yaml")]
        format: CliFormat,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Component {
        #[arg(value_name = "TYPE")]
        kind: String,
        component: String,
        #[arg(long)]
        stack: String,
        #[arg(long)]
        provenance: bool,
        #[arg(long = "query")]
        query: Option<String>,
        #[arg(long, value_enum, default_value = "yaml")]
        format: CliFormat,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Affected {
        #[arg(long = "changed", value_delimiter = ',')]
        changed: Vec<String>,
        #[arg(long, value_enum, default_value = "yaml")]
        format: CliFormat,
    },
    Dependents {
        /// `stack/type/name`.
        component: String,
        #[arg(long, value_enum, default_value = "yaml")]
        format: CliFormat,
    },
}

#[derive(Subcommand, Debug)]
enum AuthAction {
    Login { identity: String },
    Refresh { identity: String },
    Logout {
        identity: Option<String>,
        #[arg(long)]
        all: bool,
    },
    Status { identity: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let cancellation = Cancellation::new();
    {
        let cancellation = cancellation.clone();
        if let Err(err) = ctrlc::set_handler(move || cancellation.cancel()) {
            tracing::warn!(error = %err, "failed to install SIGINT handler, Ctrl-C will not cancel in-flight work");
        }
    }

    let exit_code = match run(cli, cancellation) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            AtmosError::downcast(&err).map(|e| e.exit_code()).unwrap_or(1)
        }
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = std::env::var("ATMOS_LOGS_LEVEL")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match std::env::var("ATMOS_LOGS_FILE").ok().and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok()) {
        Some(file) => builder.with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn render_error(err: &anyhow::Error) -> String {
    match AtmosError::downcast(err) {
        Some(atmos_err) => atmos_err.to_string(),
        None => format!("{err:#}"),
    }
}

fn run(cli: Cli, cancellation: Cancellation) -> Result<()> {
    let core = AtmosCore::bootstrap_with_config_path(&cli.base_path, cli.config.as_deref())
        .context("failed to bootstrap atmos core")?;

    let identity = resolve_identity(&core, &cli)?;

    let no_input = cli.no_input;
    match cli.command {
        Command::Describe { target } => run_describe(&core, identity, cancellation, target),
        Command::Workflow { name, stack, dry_run } => run_workflow(&core, identity, cancellation, no_input, &name, stack, dry_run),
        Command::Auth { action } => run_auth(&core, action, cancellation),
        Command::Component(args) => {
            let invocation = parse_component_invocation(&args)?;
            dispatch_component(&core, invocation, identity, cancellation)
        }
    }
}

/// Resolve `--identity`/`--tags`/`--tag-mode` into a concrete identity
/// name, or `None` if the caller named none and no tag filter was given
/// either (identity selection is optional unless a command's
/// template functions require auth).
fn resolve_identity(core: &AtmosCore, cli: &Cli) -> Result<Option<String>> {
    match &cli.identity {
        Some(name) if !name.is_empty() => Ok(Some(name.clone())),
        Some(_) | None if cli.identity.is_some() || !cli.tags.is_empty() => {
            let picker = FirstMatchPicker;
            let identity = atmos_auth::resolve_identity_selection(&core.config.auth, None, &cli.tags, cli.tag_mode.into(), &picker)?;
            Ok(Some(identity.name.clone()))
        }
        _ => Ok(None),
    }
}

fn run_describe(core: &AtmosCore, identity: Option<String>, cancellation: Cancellation, target: DescribeTarget) -> Result<()> {
    match target {
        DescribeTarget::Stacks { query, format, file } => {
            let stack_map = compile_all_stacks(core, identity, cancellation)?;
            let rendered = describe_stacks(&stack_map, format.into(), query.as_deref())?;
            write_output(&rendered, file.as_deref())
        }
        DescribeTarget::Component { kind, component, stack, provenance, query, format, file } => {
            let compiled = core.compile_stacks(&[stack.clone()], identity, cancellation);
            check_compile_errors(&compiled)?;
            let provenance_store = provenance.then_some(&compiled.provenance);
            let rendered = describe_component(&compiled.outcome.stack_map, &stack, &kind, &component, provenance_store, format.into(), query.as_deref())?;
            write_output(&rendered, file.as_deref())
        }
        DescribeTarget::Affected { changed, format } => {
            let stack_map = compile_all_stacks(core, identity, cancellation)?;
            let graph = DependencyGraph::build(&stack_map)?;
            let changed: Vec<ComponentKey> = changed.iter().map(|raw| parse_component_key(raw)).collect::<Result<_>>()?;
            let report = describe_affected(&graph, &changed);
            let rendered = render_report(&report, format.into())?;
            write_output(&rendered, None)
        }
        DescribeTarget::Dependents { component, format } => {
            let key = parse_component_key(&component)?;
            let stack_map = compile_all_stacks(core, identity, cancellation)?;
            let graph = DependencyGraph::build(&stack_map)?;
            let report = describe_dependents(&graph, &key);
            let rendered = render_report(&report, format.into())?;
            write_output(&rendered, None)
        }
    }
}

fn compile_all_stacks(core: &AtmosCore, identity: Option<String>, cancellation: Cancellation) -> Result<atmos_types::StackMap> {
    let stack_names = discover_stack_names(core)?;
    let compiled = core.compile_stacks(&stack_names, identity, cancellation);
    check_compile_errors(&compiled)?;
    Ok(compiled.outcome.stack_map)
}

/// Walk `<base_path>/<stacks.base_path>` for every `.yaml`/`.yml` file and
/// derive its stack name from the path relative to that root (a
/// stack's name is its path under the stacks root, extension stripped),
/// skipping anything under a configured `excluded_paths` entry.
fn discover_stack_names(core: &AtmosCore) -> Result<Vec<String>> {
    let root = core.base_path.join(&core.config.stacks.base_path);
    let mut names = Vec::new();
    if root.is_dir() {
        walk_stack_dir(&root, &root, &core.config.stacks.excluded_paths, &mut names)?;
    }
    names.sort();
    Ok(names)
}

fn walk_stack_dir(root: &std::path::Path, dir: &std::path::Path, excluded: &[String], names: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading stacks directory {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if excluded.iter().any(|pattern| relative.contains(pattern.as_str())) {
            continue;
        }
        if path.is_dir() {
            walk_stack_dir(root, &path, excluded, names)?;
        } else if matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml")) {
            let name = relative.trim_end_matches(".yaml").trim_end_matches(".yml").to_string();
            names.push(name);
        }
    }
    Ok(())
}

fn check_compile_errors(compiled: &atmos_compiler::CompiledStacks) -> Result<()> {
    if compiled.outcome.is_success() {
        return Ok(());
    }
    let summary = compiled.outcome.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
    bail!("stack compilation failed:\n{summary}");
}

fn parse_component_key(raw: &str) -> Result<ComponentKey> {
    let mut parts = raw.splitn(3, '/');
    let (Some(stack), Some(kind), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("expected `stack/type/name`, got `{raw}`");
    };
    Ok(ComponentKey::new(stack, kind, name))
}

fn render_report<T: serde::Serialize>(report: &T, format: DescribeFormat) -> Result<String> {
    match format {
        DescribeFormat::Json => serde_json::to_string_pretty(report).context("rendering JSON"),
        DescribeFormat::Yaml => serde_yaml::to_string(report).context("rendering YAML"),
    }
}

fn write_output(rendered: &str, file: Option<&std::path::Path>) -> Result<()> {
    match file {
        Some(path) => std::fs::write(path, rendered).with_context(|| format!("writing output to {}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

fn run_workflow(
    core: &AtmosCore,
    identity: Option<String>,
    cancellation: Cancellation,
    no_input: bool,
    name: &str,
    stack: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let path = core.base_path.join("workflows").join(format!("{name}.yaml"));
    let content = std::fs::read_to_string(&path).with_context(|| format!("no workflow named `{name}` at {}", path.display()))?;
    let workflow: WorkflowDefinition = serde_yaml::from_str(&content).with_context(|| format!("parsing workflow `{name}`"))?;

    let reporter: Arc<dyn Reporter> = Arc::new(TerminalReporter::default());
    let prompter = Arc::new(StdinPrompter);
    let mut ctx = core.new_step_context(prompter, reporter.clone());
    ctx.cancellation = cancellation.clone();
    if no_input {
        ctx.tty = false;
    }

    if let Some(stack) = &stack {
        ctx.vars.env.insert("ATMOS_STACK".to_string(), stack.clone());
    }

    if let Some(identity_name) = &identity {
        let (auth, _info) = core.auth_manager.authenticate(identity_name, &AuthCallContext { cancellation })?;
        ctx = ctx.with_auth(auth);
    }

    if dry_run {
        reporter.line(&format!("dry-run: workflow `{name}` has {} step(s), not executing", workflow.steps.len()));
        return Ok(());
    }

    let outcome = core.workflow_engine().run(&workflow, &mut ctx)?;
    reporter.line(&format!("workflow `{name}` completed {} step(s)", outcome.completed_steps.len()));
    if outcome.exit_code != 0 {
        std::process::exit(outcome.exit_code);
    }
    Ok(())
}

fn run_auth(core: &AtmosCore, action: AuthAction, cancellation: Cancellation) -> Result<()> {
    let ctx = AuthCallContext { cancellation };
    match action {
        AuthAction::Login { identity } => {
            let (_auth, info) = core.auth_manager.authenticate(&identity, &ctx)?;
            println!("authenticated as `{identity}` (from_cache={}, expires_at={:?})", info.from_cache, info.expires_at);
            Ok(())
        }
        AuthAction::Refresh { identity } => {
            let (_auth, info) = core.auth_manager.refresh(&identity, &ctx)?;
            println!("refreshed `{identity}` (expires_at={:?})", info.expires_at);
            Ok(())
        }
        AuthAction::Logout { identity, all } => {
            if all {
                for name in core.auth_manager.cached_identities()? {
                    core.auth_manager.logout(&name)?;
                }
                println!("logged out every cached identity");
            } else {
                let identity = identity.context("an identity name is required unless --all is given")?;
                core.auth_manager.logout(&identity)?;
                println!("logged out `{identity}`");
            }
            Ok(())
        }
        AuthAction::Status { identity } => {
            let names = match identity {
                Some(name) => vec![name],
                None => core.auth_manager.cached_identities()?,
            };
            for name in names {
                match core.auth_manager.stack_info(&name)? {
                    Some(info) => println!("{name}: cached, expires_at={:?}", info.expires_at),
                    None => println!("{name}: not cached"),
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_component_key_splits_three_parts() {
        let key = parse_component_key("prod/terraform/vpc").unwrap();
        assert_eq!(key, ComponentKey::new("prod", "terraform", "vpc"));
    }

    #[test]
    fn parse_component_key_rejects_too_few_parts() {
        assert!(parse_component_key("prod/terraform").is_err());
    }

    #[test]
    fn cli_parses_global_flags_before_subcommand() {
        let cli = Cli::parse_from(["atmos", "--base-path", "/tmp/x", "describe", "stacks"]);
        assert_eq!(cli.base_path, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn cli_parses_external_component_subcommand() {
        let cli = Cli::parse_from(["atmos", "terraform", "plan", "vpc", "--stack", "prod"]);
        match cli.command {
            Command::Component(args) => assert_eq!(args, vec!["terraform", "plan", "vpc", "--stack", "prod"]),
            other => panic!("expected Component, got {other:?}"),
        }
    }
}
