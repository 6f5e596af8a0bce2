use atmos_types::Value;

use crate::key::ProvenanceKey;
use crate::store::ProvenanceStore;

/// Renders a compiled component's configuration as YAML with a trailing
/// `# ○|●|∴ [N] file:line` comment on every leaf that has a provenance
/// entry. Comments are YAML comments: re-parsing the output
/// (`parse_rendered`) discards them and yields the same data tree as the
/// input, which is the round-trip law this renderer must satisfy.
pub fn render_with_provenance(
    value: &Value,
    store: &ProvenanceStore,
    stack: &str,
    component_type: &str,
    name: &str,
) -> String {
    let mut out = String::new();
    emit(value, 0, "", stack, component_type, name, store, &mut out);
    out
}

/// Re-parses rendered output back into a `Value`, for the round-trip law.
pub fn parse_rendered(text: &str) -> Result<Value, serde_yaml::Error> {
    serde_yaml::from_str(text)
}

#[allow(clippy::too_many_arguments)]
fn emit(
    value: &Value,
    indent: usize,
    path: &str,
    stack: &str,
    component_type: &str,
    name: &str,
    store: &ProvenanceStore,
    out: &mut String,
) {
    match value {
        Value::Map(map) => {
            for (k, sub) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                push_indent(out, indent);
                out.push_str(&quote_if_needed(k));
                out.push(':');
                emit_child(sub, indent, &child_path, stack, component_type, name, store, out);
            }
        }
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                let child_path = format!("{path}[{i}]");
                push_indent(out, indent);
                out.push('-');
                emit_list_item(item, indent, &child_path, stack, component_type, name, store, out);
            }
        }
        other => {
            push_indent(out, indent);
            out.push_str(&scalar_repr(other));
            append_comment(out, path, stack, component_type, name, store);
            out.push('\n');
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_child(
    sub: &Value,
    indent: usize,
    child_path: &str,
    stack: &str,
    component_type: &str,
    name: &str,
    store: &ProvenanceStore,
    out: &mut String,
) {
    match sub {
        Value::Map(m) if !m.is_empty() => {
            out.push('\n');
            emit(sub, indent + 1, child_path, stack, component_type, name, store, out);
        }
        Value::List(l) if !l.is_empty() => {
            out.push('\n');
            emit(sub, indent + 1, child_path, stack, component_type, name, store, out);
        }
        _ => {
            out.push(' ');
            out.push_str(&scalar_or_empty_repr(sub));
            append_comment(out, child_path, stack, component_type, name, store);
            out.push('\n');
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_list_item(
    item: &Value,
    indent: usize,
    child_path: &str,
    stack: &str,
    component_type: &str,
    name: &str,
    store: &ProvenanceStore,
    out: &mut String,
) {
    match item {
        Value::Map(m) if !m.is_empty() => {
            out.push('\n');
            emit(item, indent + 1, child_path, stack, component_type, name, store, out);
        }
        Value::List(l) if !l.is_empty() => {
            out.push('\n');
            emit(item, indent + 1, child_path, stack, component_type, name, store, out);
        }
        _ => {
            out.push(' ');
            out.push_str(&scalar_or_empty_repr(item));
            append_comment(out, child_path, stack, component_type, name, store);
            out.push('\n');
        }
    }
}

fn append_comment(
    out: &mut String,
    path: &str,
    stack: &str,
    component_type: &str,
    name: &str,
    store: &ProvenanceStore,
) {
    let key = ProvenanceKey::new(stack, component_type, name, path);
    if let Some(latest) = store.latest(&key) {
        out.push_str("  # ");
        out.push_str(&latest.render_marker());
    }
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

fn scalar_or_empty_repr(value: &Value) -> String {
    match value {
        Value::Map(m) if m.is_empty() => "{}".to_string(),
        Value::List(l) if l.is_empty() => "[]".to_string(),
        other => scalar_repr(other),
    }
}

fn scalar_repr(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_if_needed(s),
        Value::Map(_) | Value::List(_) => unreachable!("scalar_repr called on a container"),
    }
}

fn quote_if_needed(s: &str) -> String {
    let plain_safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        && !matches!(s, "true" | "false" | "null" | "~");
    if plain_safe {
        s.to_string()
    } else {
        serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}"))
    }
}
