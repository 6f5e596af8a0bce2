use atmos_registry::Registry;
use atmos_types::Value;

/// Extension point for custom YAML functions beyond the five built-ins
/// (`terraform.output`, `terraform.state`, `include`, `env`, `exec`) that
/// `TemplateEngine` evaluates directly. Registered exactly like every
/// other extensibility point in this workspace: a kind string to a
/// factory, guarded by a lock (`atmos-registry`). The "config" a factory
/// receives is the function's argument list, packed as
/// `Value::List(vec![Value::String(arg), ...])`; `TemplateEngine` checks
/// this registry before falling back to a built-in, so an embedder can
/// shadow `env` or add a wholly new function kind without forking the
/// engine. Functions registered here do not receive the current
/// `AuthContext` — that capability is reserved for the two built-in
/// Terraform functions, which are the only ones step 5 names as
/// credential-gated.
pub type FunctionRegistry = Registry<Value>;

/// A custom YAML function is written as a plain scalar whose text begins
/// with `!`, e.g. `"!terraform.output vpc vpc_cidr"`. We deliberately parse
/// this out of an ordinary (possibly quoted) string rather than a real YAML
/// tag: `atmos-yaml` only tracks positions, not tag handles, so function
/// calls are plain data as far as the loader and merge engine are
/// concerned, and only `atmos-template` gives them meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub kind: String,
    pub args: Vec<String>,
}

pub fn parse_function_call(text: &str) -> Option<FunctionCall> {
    let rest = text.strip_prefix('!')?;
    let mut parts = split_args(rest);
    if parts.is_empty() {
        return None;
    }
    let kind = parts.remove(0);
    if kind.is_empty() {
        return None;
    }
    Some(FunctionCall { kind, args: parts })
}

/// Splits on whitespace, honoring double-quoted segments so
/// `!include "catalog/base.yaml"` keeps the path as one argument.
fn split_args(rest: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in rest.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

impl FunctionCall {
    pub fn args_as_value(&self) -> Value {
        Value::List(self.args.iter().cloned().map(Value::String).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_function_call() {
        let call = parse_function_call("!terraform.output vpc vpc_cidr").unwrap();
        assert_eq!(call.kind, "terraform.output");
        assert_eq!(call.args, vec!["vpc", "vpc_cidr"]);
    }

    #[test]
    fn quoted_argument_stays_intact() {
        let call = parse_function_call("!include \"catalog/base.yaml\"").unwrap();
        assert_eq!(call.kind, "include");
        assert_eq!(call.args, vec!["catalog/base.yaml"]);
    }

    #[test]
    fn plain_strings_are_not_function_calls() {
        assert_eq!(parse_function_call("prod-ue2"), None);
        assert_eq!(parse_function_call(""), None);
    }

    #[test]
    fn bare_bang_is_not_a_function_call() {
        assert_eq!(parse_function_call("!"), None);
    }
}
