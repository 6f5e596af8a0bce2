//! The credential-bearing struct that flows from the auth manager into
//! template evaluation and provider execution (glossary: `AuthContext`).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What an authenticated identity exposes downstream: exported environment
/// variables (for subprocess injection) and, where the identity kind writes
/// one, a path to a credential file (e.g. an AWS shared-credentials file or
/// a kubeconfig). Never serialized wholesale to disk — this is an
/// in-process handoff, not the cache format (`atmos-auth` owns that).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub identity_name: String,
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub principal: BTreeMap<String, String>,
}

impl AuthContext {
    pub fn new(identity_name: impl Into<String>) -> Self {
        Self {
            identity_name: identity_name.into(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }
}
