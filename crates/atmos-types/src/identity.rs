//! Identity and provider data model (auth manager inputs).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth_context::AuthContext;
use crate::value::Value;

/// Tag and label storage kept as two distinct shapes — tags as a list,
/// labels as a map — rather than collapsed into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl TagSet {
    pub fn matches_any(&self, wanted: &[String]) -> bool {
        wanted.iter().any(|w| self.tags.contains(w) || self.labels.values().any(|v| v == w))
    }

    pub fn matches_all(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|w| self.tags.contains(w) || self.labels.values().any(|v| v == w))
    }
}

/// `(name, kind, via?, principal, tags?, labels?, env?)` per #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(default)]
    pub principal: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub tag_set: TagSet,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Identity {
    /// `principal.ecr_login: true` opt-in (post-auth hook).
    pub fn ecr_login_enabled(&self) -> bool {
        matches!(self.principal.get("ecr_login"), Some(Value::Bool(true)))
    }
}

/// `(name, kind, kind-specific config, tags?)` per #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub tag_set: TagSet,
}

/// `auth.{providers, identities}` section of `atmos.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub providers: BTreeMap<String, Provider>,
    #[serde(default)]
    pub identities: BTreeMap<String, Identity>,
}

/// Tag-filter match mode for `--tags`/`--tag-mode` identity selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMode {
    Any,
    All,
}
