use std::collections::BTreeMap as Map;

use anyhow::{Context, Result};
use atmos_provenance::Position;
use atmos_types::Value;
use yaml_rust2::Event;
use yaml_rust2::parser::{MarkedEventReceiver, Parser};
use yaml_rust2::scanner::Marker;

use crate::scalar::resolve_scalar;

/// The result of loading one YAML file: the merged data tree (documents
/// flattened in declaration order, ) plus a position for every
/// leaf, keyed by its synthesized JSONPath.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocument {
    pub value: Value,
    pub positions: Map<String, Position>,
}

/// Parse `content` (from `file`, used only to stamp positions) into a
/// `LoadedDocument`. Anchors/aliases are resolved; positions are attributed
/// to the alias use site, not the anchor definition, because the receiver
/// stamps a position only when a node is placed into its parent slot.
pub fn load(file: &str, content: &str) -> Result<LoadedDocument> {
    let mut receiver = Receiver::new(file);
    let mut parser = Parser::new(content.chars());
    parser
        .load(&mut receiver, true)
        .with_context(|| format!("failed to parse YAML in {file}"))?;

    let mut iter = receiver.docs.into_iter();
    let mut merged = iter.next().unwrap_or(Value::empty_map());
    for doc in iter {
        merge_top_level(&mut merged, doc);
    }

    Ok(LoadedDocument {
        value: merged,
        positions: receiver.positions,
    })
}

/// Multi-document flattening: later documents' top-level keys override
/// earlier ones. This is YAML-loader-local combination of `---`-delimited
/// documents within a single file; cross-file import merging is
/// `atmos-merge`'s job.
fn merge_top_level(into: &mut Value, from: Value) {
    match (into, from) {
        (Value::Map(into_map), Value::Map(from_map)) => {
            for (k, v) in from_map {
                into_map.insert(k, v);
            }
        }
        (slot, from) => *slot = from,
    }
}

enum Frame {
    Seq {
        items: Vec<Value>,
        aid: usize,
        base_path: String,
    },
    Map {
        entries: Map<String, Value>,
        aid: usize,
        base_path: String,
        pending_key: Option<String>,
    },
}

impl Frame {
    fn base_path(&self) -> &str {
        match self {
            Frame::Seq { base_path, .. } => base_path,
            Frame::Map { base_path, .. } => base_path,
        }
    }
}

struct Receiver<'a> {
    file: &'a str,
    stack: Vec<Frame>,
    docs: Vec<Value>,
    positions: Map<String, Position>,
    anchors: Map<usize, Value>,
}

impl<'a> Receiver<'a> {
    fn new(file: &'a str) -> Self {
        Self {
            file,
            stack: Vec::new(),
            docs: Vec::new(),
            positions: Map::new(),
            anchors: Map::new(),
        }
    }

    /// Path the next child placed into the current top-of-stack frame will
    /// receive, without mutating anything.
    fn next_child_path(&self) -> String {
        match self.stack.last() {
            None => String::new(),
            Some(Frame::Seq { items, base_path, .. }) => {
                format!("{base_path}[{}]", items.len())
            }
            Some(Frame::Map {
                base_path,
                pending_key: Some(k),
                ..
            }) => {
                if base_path.is_empty() {
                    k.clone()
                } else {
                    format!("{base_path}.{k}")
                }
            }
            Some(Frame::Map {
                pending_key: None, ..
            }) => String::new(),
        }
    }

    fn stamp(&mut self, path: &str, marker: Marker) {
        if path.is_empty() {
            return;
        }
        self.positions
            .insert(path.to_string(), Position::new(self.file, marker.line() as u32, marker.col() as u32 + 1));
    }

    /// Place a completed node (scalar, alias target, or just-closed
    /// container) into whatever is waiting for it: the pending key of a map
    /// frame, the next slot of a sequence frame, or — if the stack is
    /// empty — the current top-level document.
    fn place(&mut self, node: Value, aid: usize) {
        if aid != 0 {
            self.anchors.insert(aid, node.clone());
        }

        match self.stack.last_mut() {
            None => self.docs.push(node),
            Some(Frame::Seq { items, .. }) => items.push(node),
            Some(Frame::Map {
                entries,
                pending_key,
                ..
            }) => {
                if let Some(key) = pending_key.take() {
                    entries.insert(key, node);
                } else {
                    // This node IS the key; stash its rendered text.
                    let key = match &node {
                        Value::String(s) => s.clone(),
                        other => format!("{other:?}"),
                    };
                    *pending_key = Some(key);
                }
            }
        }
    }
}

impl<'a> MarkedEventReceiver for Receiver<'a> {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        match ev {
            Event::SequenceStart(aid, _tag) => {
                let base_path = self.next_child_path();
                self.stamp(&base_path, marker);
                self.stack.push(Frame::Seq {
                    items: Vec::new(),
                    aid,
                    base_path,
                });
            }
            Event::MappingStart(aid, _tag) => {
                let base_path = self.next_child_path();
                self.stamp(&base_path, marker);
                self.stack.push(Frame::Map {
                    entries: Map::new(),
                    aid,
                    base_path,
                    pending_key: None,
                });
            }
            Event::SequenceEnd => {
                if let Some(Frame::Seq { items, aid, .. }) = self.stack.pop() {
                    self.place(Value::List(items), aid);
                }
            }
            Event::MappingEnd => {
                if let Some(Frame::Map { entries, aid, .. }) = self.stack.pop() {
                    self.place(Value::Map(entries), aid);
                }
            }
            Event::Scalar(text, style, aid, _tag) => {
                let path = self.next_child_path();
                // Keys (pending_key == None while inside a map frame) don't
                // get a provenance entry of their own; values do.
                let is_value_slot = !matches!(
                    self.stack.last(),
                    Some(Frame::Map { pending_key: None, .. })
                );
                if is_value_slot {
                    self.stamp(&path, marker);
                }
                self.place(resolve_scalar(&text, style), aid);
            }
            Event::Alias(id) => {
                let node = self.anchors.get(&id).cloned().unwrap_or(Value::Null);
                let path = self.next_child_path();
                self.stamp(&path, marker);
                self.place(node, 0);
            }
            Event::DocumentStart | Event::DocumentEnd => {}
            Event::StreamStart | Event::StreamEnd | Event::Nothing => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_map_records_leaf_positions() {
        let doc = load("catalog/vpc.yaml", "vars:\n  cidr: \"10.0.0.0/16\"\n").unwrap();
        assert_eq!(
            doc.value.get_path("vars.cidr"),
            Some(&Value::String("10.0.0.0/16".to_string()))
        );
        let pos = doc.positions.get("vars.cidr").expect("position recorded");
        assert_eq!(pos.file, "catalog/vpc.yaml");
        assert_eq!(pos.line, 2);
    }

    #[test]
    fn list_indices_get_bracketed_paths() {
        let doc = load("stacks/prod.yaml", "vars:\n  tags:\n    - dev\n    - prod\n").unwrap();
        assert_eq!(
            doc.value.get_json_path("vars.tags[1]"),
            Some(&Value::String("prod".to_string()))
        );
        assert!(doc.positions.contains_key("vars.tags[1]"));
    }

    #[test]
    fn anchors_resolve_and_alias_site_gets_its_own_position() {
        let content = "base: &b\n  cidr: 10.0.0.0/16\nover:\n  <<: *b\n  cidr: 10.100.0.0/16\noverride: *b\n";
        let doc = load("stacks/prod.yaml", content).unwrap();
        assert_eq!(
            doc.value.get_path("override.cidr"),
            Some(&Value::String("10.0.0.0/16".to_string()))
        );
        assert!(doc.positions.contains_key("override"));
    }

    #[test]
    fn multi_document_files_flatten_with_later_wins() {
        let content = "a: 1\n---\na: 2\nb: 3\n";
        let doc = load("stacks/multi.yaml", content).unwrap();
        assert_eq!(doc.value.get_path("a"), Some(&Value::Number(atmos_types::Number::Int(2))));
        assert_eq!(doc.value.get_path("b"), Some(&Value::Number(atmos_types::Number::Int(3))));
    }

    #[test]
    fn self_import_style_cycle_is_not_this_loaders_concern() {
        // The loader has no notion of imports; cycle detection belongs to
        // the compiler's import-DAG pass.
        let doc = load("stacks/a.yaml", "import:\n  - a\n").unwrap();
        assert!(doc.value.get_path("import").is_some());
    }
}
