//! The dynamically-typed tree manifests are represented as before a
//! component provider refines it into its own typed config.
//!
//! Stack manifests are heterogeneous YAML; rather than leak a raw
//! `serde_yaml::Value`/`serde_json::Value` into business logic (the merge
//! engine, the compiler, the template evaluator all need to walk it the same
//! way), we model it as one closed, tagged enum. Maps use `BTreeMap` rather
//! than `HashMap` so iteration order is sorted-by-key everywhere a consumer
//! walks a `Value::Map` — the deep-merge engine's determinism guarantee
//! depends on this.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically-typed manifest value: `Map | List | String | Number | Bool | Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// A manifest number, kept distinct from f64 so integers round-trip exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

impl Value {
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Empty map, the identity element for merges.
    pub fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Look up a dotted path (`a.b.c`), returning `None` if any segment is
    /// missing or not a map. Does not interpret list indices; callers that
    /// need `vars.tags[0]`-style indexing should use [`Value::get_json_path`].
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for seg in path.split('.') {
            if seg.is_empty() {
                continue;
            }
            cur = cur.as_map()?.get(seg)?;
        }
        Some(cur)
    }

    /// Look up a synthetic JSONPath of the form emitted by `atmos-yaml`,
    /// e.g. `vars.tags[0]` or `components.terraform.vpc.metadata.depends_on[1].component`.
    pub fn get_json_path(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for seg in split_json_path(path) {
            cur = match seg {
                PathSegment::Key(k) => cur.as_map()?.get(k.as_str())?,
                PathSegment::Index(i) => cur.as_list()?.get(i)?,
            };
        }
        Some(cur)
    }
}

/// One segment of a synthesized JSONPath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split `a.b[0].c` into `[Key(a), Key(b), Index(0), Key(c)]`.
pub fn split_json_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for dotted in path.split('.') {
        if dotted.is_empty() {
            continue;
        }
        let mut rest = dotted;
        // Peel off a leading key up to the first '[', then any number of
        // `[N]` index groups.
        if let Some(bracket) = rest.find('[') {
            let key = &rest[..bracket];
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                if let Some(end) = stripped.find(']') {
                    if let Ok(idx) = stripped[..end].parse::<usize>() {
                        segments.push(PathSegment::Index(idx));
                    }
                    rest = &stripped[end + 1..];
                } else {
                    break;
                }
            }
        } else {
            segments.push(PathSegment::Key(dotted.to_string()));
        }
    }
    segments
}
