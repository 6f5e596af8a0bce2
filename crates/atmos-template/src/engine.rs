//! `{{ }}` expansion and custom YAML function dispatch (step 5), including
//! template functions that require credentials.
//!
//! Go-template `{{ .steps.env.value }}`-style field access is modeled with
//! `tera`'s one-off renderer: `atmos_types::Value` round-trips through
//! `serde_json::Value` to build a `tera::Context`, since `tera` speaks JSON
//! natively and the manifest value tree is already represented as a
//! tagged-variant tree, avoiding a raw any/interface leaking into business
//! logic — the conversion stays local to this one rendering boundary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{AuthContext, Value};

use crate::function::{FunctionCall, FunctionRegistry, parse_function_call};

/// Resolves the two credential-gated functions, `!terraform.output` and
/// `!terraform.state`. The core dispatches to Terraform; it does not
/// reimplement state inspection (non-goals), so the default
/// resolver always reports `ErrNotFound` and real backends plug in their
/// own implementation (e.g. the `terraform` component provider, wired by
/// `atmos-core`).
pub trait RemoteStateResolver: Send + Sync {
    fn terraform_output(
        &self,
        component: &str,
        stack: Option<&str>,
        auth: &AuthContext,
    ) -> Result<Value>;

    fn terraform_state(
        &self,
        component: &str,
        output: &str,
        stack: Option<&str>,
        auth: &AuthContext,
    ) -> Result<Value>;
}

/// A resolver that always fails; the safe default until a real component
/// provider is wired in.
pub struct UnconfiguredResolver;

impl RemoteStateResolver for UnconfiguredResolver {
    fn terraform_output(&self, component: &str, _stack: Option<&str>, _auth: &AuthContext) -> Result<Value> {
        Err(AtmosError::new(ErrorKind::NotFound, format!("no remote-state resolver configured for component {component}"))
            .with_hint("terraform output resolution is dispatched by the component provider, not the core")
            .into())
    }

    fn terraform_state(&self, component: &str, output: &str, _stack: Option<&str>, _auth: &AuthContext) -> Result<Value> {
        Err(AtmosError::new(
            ErrorKind::NotFound,
            format!("no remote-state resolver configured for {component}.{output}"),
        )
        .into())
    }
}

/// Expands `{{ }}` template expressions and evaluates custom YAML
/// functions (`!terraform.output`, `!include`, `!env`, `!exec`) over a
/// compiled component's configuration tree.
pub struct TemplateEngine {
    base_path: PathBuf,
    resolver: Arc<dyn RemoteStateResolver>,
    extra_functions: FunctionRegistry,
}

impl TemplateEngine {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            resolver: Arc::new(UnconfiguredResolver),
            extra_functions: FunctionRegistry::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn RemoteStateResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Register an additional (or overriding) custom YAML function kind.
    pub fn register_function(
        &self,
        kind: impl Into<String>,
        factory: atmos_registry::Factory<Value>,
    ) {
        self.extra_functions.register(kind, factory);
    }

    /// Render every string leaf of `value`, leaving other scalar kinds
    /// untouched. `vars` supplies the `{{ }}` context (workflow
    /// `Variables`, or stack-level `vars`/`env` for compiler use); `auth`
    /// is `None` when no identity has been authenticated yet for this
    /// stack (step 5: credential-requiring functions then fail
    /// with `ErrAuthRequired`).
    pub fn render_value(&self, value: &Value, vars: &Value, auth: Option<&AuthContext>) -> Result<Value> {
        match value {
            Value::String(s) => self.render_string(s, vars, auth),
            Value::Map(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.render_value(v, vars, auth)?);
                }
                Ok(Value::Map(out))
            }
            Value::List(items) => {
                let rendered = items
                    .iter()
                    .map(|v| self.render_value(v, vars, auth))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// Render one scalar string: `{{ }}` expansion first, then — if the
    /// expanded text is a bare `!function arg…` call — function dispatch.
    pub fn render_string(&self, text: &str, vars: &Value, auth: Option<&AuthContext>) -> Result<Value> {
        let expanded = self.expand_go_template(text, vars)?;
        match parse_function_call(&expanded) {
            Some(call) => self.dispatch_function(&call, auth),
            None => Ok(Value::String(expanded)),
        }
    }

    fn expand_go_template(&self, text: &str, vars: &Value) -> Result<String> {
        if !text.contains("{{") {
            return Ok(text.to_string());
        }
        let json = value_to_json(vars);
        let context = tera::Context::from_serialize(&json)
            .context("failed to build template context")?;
        let normalized = strip_leading_field_dots(text);
        tera::Tera::one_off(&normalized, &context, false).map_err(|e| {
            AtmosError::new(ErrorKind::TemplateEval, format!("template evaluation failed: {e}"))
                .with_explanation(e.to_string())
                .into()
        })
    }

    fn dispatch_function(&self, call: &FunctionCall, auth: Option<&AuthContext>) -> Result<Value> {
        if let Some(factory) = self.extra_functions.get(&call.kind) {
            return factory(&call.kind, &call.args_as_value());
        }
        match call.kind.as_str() {
            "env" => self.fn_env(call),
            "include" => self.fn_include(call),
            "exec" => self.fn_exec(call),
            "terraform.output" => self.fn_terraform_output(call, auth),
            "terraform.state" => self.fn_terraform_state(call, auth),
            other => Err(AtmosError::new(
                ErrorKind::TemplateEval,
                format!("unknown template function: !{other}"),
            )
            .with_hint("known functions: terraform.output, terraform.state, include, env, exec")
            .into()),
        }
    }

    fn fn_env(&self, call: &FunctionCall) -> Result<Value> {
        let var = call.args.first().ok_or_else(|| missing_arg("env", "VAR"))?;
        match std::env::var(var) {
            Ok(v) => Ok(Value::String(v)),
            Err(_) => Err(AtmosError::new(ErrorKind::NotFound, format!("environment variable not set: {var}")).into()),
        }
    }

    fn fn_include(&self, call: &FunctionCall) -> Result<Value> {
        let file = call.args.first().ok_or_else(|| missing_arg("include", "file"))?;
        let path = resolve_include_path(&self.base_path, file);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read included file {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse included file {}", path.display()))?;

        match call.args.get(1) {
            Some(query) => value
                .get_json_path(query)
                .cloned()
                .ok_or_else(|| AtmosError::new(ErrorKind::NotFound, format!("query {query} not found in {file}")).into()),
            None => Ok(value),
        }
    }

    fn fn_exec(&self, call: &FunctionCall) -> Result<Value> {
        if call.args.is_empty() {
            return Err(missing_arg("exec", "cmd"));
        }
        let cmdline = call.args.join(" ");
        let opts = atmos_process::RunOptions::new().in_dir(&self.base_path);
        let output = atmos_process::run_checked("sh", &["-c", &cmdline], &opts)
            .with_context(|| format!("!exec {cmdline} failed"))?;
        Ok(Value::String(output.stdout.trim_end().to_string()))
    }

    fn fn_terraform_output(&self, call: &FunctionCall, auth: Option<&AuthContext>) -> Result<Value> {
        let auth = require_auth(auth)?;
        let component = call.args.first().ok_or_else(|| missing_arg("terraform.output", "component"))?;
        let stack = call.args.get(1).map(String::as_str);
        self.resolver.terraform_output(component, stack, auth)
    }

    fn fn_terraform_state(&self, call: &FunctionCall, auth: Option<&AuthContext>) -> Result<Value> {
        let auth = require_auth(auth)?;
        let component = call.args.first().ok_or_else(|| missing_arg("terraform.state", "component"))?;
        let output = call.args.get(1).ok_or_else(|| missing_arg("terraform.state", "output"))?;
        let stack = call.args.get(2).map(String::as_str);
        self.resolver.terraform_state(component, output, stack, auth)
    }
}

fn require_auth(auth: Option<&AuthContext>) -> Result<&AuthContext> {
    auth.ok_or_else(|| {
        AtmosError::new(ErrorKind::AuthRequired, "template function requires an authenticated identity")
            .with_hint("pass --identity or set ATMOS_IDENTITY before running a command that templates this stack")
            .into()
    })
}

fn missing_arg(function: &str, arg: &str) -> anyhow::Error {
    AtmosError::new(ErrorKind::TemplateEval, format!("!{function} requires argument `{arg}`")).into()
}

fn resolve_include_path(base: &Path, file: &str) -> PathBuf {
    let candidate = Path::new(file);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Go templates address the variable root with a leading dot
/// (`{{ .steps.env.value }}`); tera has no such notion and reads the same
/// path as a plain field access (`{{ steps.env.value }}`). Strip exactly
/// one leading `.` right after each `{{` (or `{{-`) delimiter so both
/// spellings work, without touching dots anywhere else in the expression.
fn strip_leading_field_dots(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start + 2]);
        let mut tail = &rest[start + 2..];
        if let Some(stripped) = tail.strip_prefix('-') {
            out.push('-');
            tail = stripped;
        }
        let ws_len = tail.len() - tail.trim_start().len();
        out.push_str(&tail[..ws_len]);
        tail = &tail[ws_len..];
        if let Some(stripped) = tail.strip_prefix('.') {
            tail = stripped;
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn vars_with_step_value(name: &str, value: &str) -> Value {
        let mut step = BTreeMap::new();
        step.insert("value".to_string(), Value::String(value.to_string()));
        let mut steps = BTreeMap::new();
        steps.insert(name.to_string(), Value::Map(step));
        let mut root = BTreeMap::new();
        root.insert("steps".to_string(), Value::Map(steps));
        Value::Map(root)
    }

    #[test]
    fn expands_dotted_field_access() {
        let engine = TemplateEngine::new(".");
        let vars = vars_with_step_value("env", "prod");
        let rendered = engine
            .render_string("terraform plan vpc -s {{ steps.env.value }}", &vars, None)
            .unwrap();
        assert_eq!(rendered, Value::String("terraform plan vpc -s prod".to_string()));
    }

    #[test]
    fn leading_dot_field_access_matches_go_template_spelling() {
        let engine = TemplateEngine::new(".");
        let vars = vars_with_step_value("env", "prod");
        let rendered = engine
            .render_string("terraform plan vpc -s {{ .steps.env.value }}", &vars, None)
            .unwrap();
        assert_eq!(rendered, Value::String("terraform plan vpc -s prod".to_string()));
    }

    #[test]
    fn plain_string_without_braces_passes_through() {
        let engine = TemplateEngine::new(".");
        let rendered = engine.render_string("prod-ue2", &Value::Null, None).unwrap();
        assert_eq!(rendered, Value::String("prod-ue2".to_string()));
    }

    #[test]
    fn env_function_reads_process_env() {
        temp_env::with_var("ATMOS_TEST_VAR", Some("hello"), || {
            let engine = TemplateEngine::new(".");
            let rendered = engine.render_string("!env ATMOS_TEST_VAR", &Value::Null, None).unwrap();
            assert_eq!(rendered, Value::String("hello".to_string()));
        });
    }

    #[test]
    fn env_function_missing_var_errors() {
        let engine = TemplateEngine::new(".");
        let err = engine
            .render_string("!env ATMOS_DOES_NOT_EXIST_XYZ", &Value::Null, None)
            .unwrap_err();
        let atmos_err = AtmosError::downcast(&err).expect("sentinel");
        assert_eq!(atmos_err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn terraform_output_without_auth_fails_with_auth_required() {
        let engine = TemplateEngine::new(".");
        let err = engine
            .render_string("!terraform.output vpc vpc_cidr", &Value::Null, None)
            .unwrap_err();
        let atmos_err = AtmosError::downcast(&err).expect("sentinel");
        assert_eq!(atmos_err.kind, ErrorKind::AuthRequired);
    }

    struct StubResolver;
    impl RemoteStateResolver for StubResolver {
        fn terraform_output(&self, component: &str, _stack: Option<&str>, _auth: &AuthContext) -> Result<Value> {
            Ok(Value::String(format!("{component}-cidr")))
        }
        fn terraform_state(&self, _component: &str, _output: &str, _stack: Option<&str>, _auth: &AuthContext) -> Result<Value> {
            unreachable!()
        }
    }

    #[test]
    fn terraform_output_with_auth_dispatches_to_resolver() {
        let engine = TemplateEngine::new(".").with_resolver(Arc::new(StubResolver));
        let auth = AuthContext::new("deploy");
        let rendered = engine
            .render_string("!terraform.output vpc", &Value::Null, Some(&auth))
            .unwrap();
        assert_eq!(rendered, Value::String("vpc-cidr".to_string()));
    }

    #[test]
    fn include_function_reads_and_queries_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.yaml"), "vars:\n  cidr: 10.0.0.0/16\n").unwrap();
        let engine = TemplateEngine::new(dir.path());
        let rendered = engine
            .render_string("!include base.yaml vars.cidr", &Value::Null, None)
            .unwrap();
        assert_eq!(rendered, Value::String("10.0.0.0/16".to_string()));
    }

    #[test]
    fn extra_function_registry_is_tried_before_built_ins() {
        use std::sync::Arc as StdArc;
        let engine = TemplateEngine::new(".");
        engine.register_function("env", StdArc::new(|_, _| Ok(Value::String("shadowed".to_string()))));
        let rendered = engine.render_string("!env WHATEVER", &Value::Null, None).unwrap();
        assert_eq!(rendered, Value::String("shadowed".to_string()));
    }

    #[test]
    fn render_value_walks_nested_maps_and_lists() {
        let engine = TemplateEngine::new(".");
        let vars = vars_with_step_value("env", "staging");
        let mut inner = BTreeMap::new();
        inner.insert(
            "tags".to_string(),
            Value::List(vec![Value::String("{{ steps.env.value }}".to_string())]),
        );
        let tree = Value::Map(inner);

        let rendered = engine.render_value(&tree, &vars, None).unwrap();
        assert_eq!(
            rendered.get_path("tags"),
            Some(&Value::List(vec![Value::String("staging".to_string())]))
        );
    }
}
