use atmos_types::{Number, Value};
use yaml_rust2::scanner::TScalarStyle;

/// Resolve a plain scalar's text into a typed `Value`, following the YAML
/// core schema (same resolution rules yaml-rust2's own `Yaml` loader uses).
/// Quoted scalars (single/double) are never interpreted — they stay strings
/// regardless of their text, since `"true"` and `true` must round-trip
/// differently.
pub fn resolve_scalar(raw: &str, style: TScalarStyle) -> Value {
    if style != TScalarStyle::Plain {
        return Value::String(raw.to_string());
    }

    match raw {
        "~" | "null" | "Null" | "NULL" | "" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(Number::Int(i));
    }
    if looks_like_float(raw) {
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Number(Number::Float(f));
        }
    }

    Value::String(raw.to_string())
}

/// Plain scalars that parse as `f64` but aren't meant as numbers (e.g. a
/// version string like `1.2.3` fails `f64::parse` anyway, but a git ref
/// segment like `1e10` should not silently become a number) are filtered by
/// requiring at least one digit and only digit/`.`/`-`/`+`/`e`/`E` chars.
fn looks_like_float(raw: &str) -> bool {
    let mut has_digit = false;
    let mut chars = raw.chars().peekable();
    if matches!(chars.peek(), Some('+') | Some('-')) {
        chars.next();
    }
    for c in chars {
        if c.is_ascii_digit() {
            has_digit = true;
        } else if !matches!(c, '.' | 'e' | 'E' | '+' | '-') {
            return false;
        }
    }
    has_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_scalars_resolve_by_core_schema() {
        assert_eq!(resolve_scalar("true", TScalarStyle::Plain), Value::Bool(true));
        assert_eq!(resolve_scalar("~", TScalarStyle::Plain), Value::Null);
        assert_eq!(resolve_scalar("42", TScalarStyle::Plain), Value::Number(Number::Int(42)));
        assert_eq!(
            resolve_scalar("3.14", TScalarStyle::Plain),
            Value::Number(Number::Float(3.14))
        );
        assert_eq!(
            resolve_scalar("prod-ue2", TScalarStyle::Plain),
            Value::String("prod-ue2".to_string())
        );
    }

    #[test]
    fn quoted_scalars_never_resolve_to_non_strings() {
        assert_eq!(
            resolve_scalar("true", TScalarStyle::DoubleQuoted),
            Value::String("true".to_string())
        );
        assert_eq!(
            resolve_scalar("42", TScalarStyle::SingleQuoted),
            Value::String("42".to_string())
        );
    }

    #[test]
    fn version_like_strings_stay_strings() {
        assert_eq!(
            resolve_scalar("1.2.3", TScalarStyle::Plain),
            Value::String("1.2.3".to_string())
        );
    }
}
