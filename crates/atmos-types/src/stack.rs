//! The compiled stack map: `stack -> type -> name -> ComponentConfig`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::component::ComponentConfig;

/// `StackMap` per `map[stack] -> map[type] -> map[name] -> ComponentConfig`.
///
/// `BTreeMap` at every level so iteration is deterministic without an
/// explicit sort step at the call site — the compiler and `describe`
/// renderer both rely on this.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackMap {
    pub stacks: BTreeMap<String, BTreeMap<String, BTreeMap<String, ComponentConfig>>>,
}

impl StackMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stack: &str, kind: &str, name: &str, config: ComponentConfig) {
        self.stacks
            .entry(stack.to_string())
            .or_default()
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), config);
    }

    pub fn get(&self, stack: &str, kind: &str, name: &str) -> Option<&ComponentConfig> {
        self.stacks.get(stack)?.get(kind)?.get(name)
    }

    /// Enumerate every `(stack, type, name)` triple, sorted.
    pub fn component_keys(&self) -> Vec<crate::component::ComponentKey> {
        let mut out = Vec::new();
        for (stack, kinds) in &self.stacks {
            for (kind, names) in kinds {
                for name in names.keys() {
                    out.push(crate::component::ComponentKey::new(
                        stack.clone(),
                        kind.clone(),
                        name.clone(),
                    ));
                }
            }
        }
        out
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.keys().map(String::as_str).collect()
    }

    /// List component names of a given kind within a stack, sorted.
    pub fn list_components(&self, stack: &str, kind: &str) -> Vec<String> {
        self.stacks
            .get(stack)
            .and_then(|kinds| kinds.get(kind))
            .map(|names| names.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A single compile error attributed to a stack and source position: any
/// per-stack error is collected and associated with `(stack, file:line)`,
/// but other stacks still compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackCompileError {
    pub stack: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: String,
}

impl std::fmt::Display for StackCompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => {
                write!(f, "{}: {}:{}: {}", self.stack, file, line, self.message)
            }
            (Some(file), None) => write!(f, "{}: {}: {}", self.stack, file, self.message),
            _ => write!(f, "{}: {}", self.stack, self.message),
        }
    }
}

/// The result of compiling a set of stacks: a successfully-compiled subset
/// of the map plus per-stack errors for the rest. Provenance is tracked in
/// `atmos-provenance` (a layer above this crate), so `atmos-compiler`
/// returns it alongside this type rather than widening `CompileOutcome`
/// with a dependency this crate doesn't otherwise need.
#[derive(Debug, Clone, Default)]
pub struct CompileOutcome {
    pub stack_map: StackMap,
    pub errors: Vec<StackCompileError>,
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
