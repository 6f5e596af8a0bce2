//! Component instances: the `(stack, type, name)` primary key that flows
//! through the compiler, the DAG, and execution dispatch.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// The primary key for a component instance. Cheap to clone; used as a map
/// key in the stack map and as a DAG vertex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    pub stack: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl ComponentKey {
    pub fn new(stack: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.stack, self.kind, self.name)
    }
}

/// A `metadata.depends_on` entry. `kind` defaults to the referencing
/// component's own kind when absent (resolved by the DAG builder, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    pub component: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// `metadata.source`, either a bare go-getter URI string or the expanded map form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Uri(String),
    Detailed {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        included_paths: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        excluded_paths: Vec<String>,
    },
}

impl SourceSpec {
    pub fn uri(&self) -> &str {
        match self {
            SourceSpec::Uri(u) => u,
            SourceSpec::Detailed { uri, .. } => uri,
        }
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            SourceSpec::Uri(_) => None,
            SourceSpec::Detailed { version, .. } => version.as_deref(),
        }
    }
}

/// Component-level metadata. `component` is the catalog base path;
/// `inherits` lists other catalog keys to deep-merge from (second DAG,
/// cycles fatal per step 4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// The materialized configuration for one `(stack, type, name)` instance,
/// after import-merge, inheritance-merge, and template evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub metadata: ComponentMetadata,
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_state_backend: Option<Value>,
    #[serde(default)]
    pub provision: BTreeMap<String, Value>,
}

/// Where a vendored component's source tree should land on disk, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPathOrigin {
    WorkingDirectoryOverride,
    ExistingLocalComponent,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    pub path: PathBuf,
    pub origin: TargetPathOrigin,
}
