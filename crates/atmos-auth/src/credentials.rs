//! The opaque credential capability object ("Credentials").

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atmos_types::{AuthContext, Value};

/// `(identity-name, principal-fingerprint)`-keyed credential, owned by the
/// auth manager and loaned by reference to callers for one command.
/// Exported to the environment/files in a kind-specific way via
/// `env`/`credentials_file`; the kind itself is opaque here, since only
/// the `AuthResolver` that produced it understands its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub identity_name: String,
    pub principal_fingerprint: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub principal: BTreeMap<String, Value>,
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

impl Credentials {
    pub fn new(identity_name: impl Into<String>, principal_fingerprint: impl Into<String>) -> Self {
        Self {
            identity_name: identity_name.into(),
            principal_fingerprint: principal_fingerprint.into(),
            issued_at: Utc::now(),
            expires_at: None,
            env: BTreeMap::new(),
            principal: BTreeMap::new(),
            credentials_file: None,
        }
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp <= Utc::now())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Project onto the `AuthContext` that flows into template evaluation
    /// and provider execution ("consumed by template functions
    /// and downstream providers").
    pub fn to_auth_context(&self) -> AuthContext {
        let mut ctx = AuthContext::new(self.identity_name.clone());
        ctx.env = self.env.clone();
        ctx.credentials_file = self.credentials_file.clone();
        ctx.principal = self
            .principal
            .iter()
            .map(|(k, v)| (k.clone(), render_scalar(v)))
            .collect();
        ctx
    }
}

fn render_scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// A stable fingerprint of a principal config map, used to detect "this
/// identity's declared config changed since the cached credential was
/// issued" without round-tripping through a cryptographic hash. The
/// cache is keyed by `(identity-name, principal-fingerprint)`; this is a
/// cache-invalidation key, not a security boundary.
pub fn fingerprint(principal: &BTreeMap<String, Value>) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    // `BTreeMap` iterates in sorted key order, so the hash is independent
    // of insertion order.
    for (k, v) in principal {
        k.hash(&mut hasher);
        serde_json::to_string(v).unwrap_or_default().hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_across_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("role".to_string(), Value::String("admin".into()));
        a.insert("region".to_string(), Value::String("us-east-2".into()));

        let mut b = BTreeMap::new();
        b.insert("region".to_string(), Value::String("us-east-2".into()));
        b.insert("role".to_string(), Value::String("admin".into()));

        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let mut a = BTreeMap::new();
        a.insert("role".to_string(), Value::String("admin".into()));
        let mut b = BTreeMap::new();
        b.insert("role".to_string(), Value::String("readonly".into()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn is_expired_respects_the_deadline() {
        let creds = Credentials::new("deploy", "fp").with_expires_at(Utc::now() - chrono::Duration::seconds(1));
        assert!(creds.is_expired());
        let fresh = Credentials::new("deploy", "fp").with_expires_at(Utc::now() + chrono::Duration::hours(1));
        assert!(!fresh.is_expired());
    }

    #[test]
    fn no_expiry_means_never_expired() {
        assert!(!Credentials::new("deploy", "fp").is_expired());
    }

    #[test]
    fn to_auth_context_carries_env_and_principal() {
        let creds = Credentials::new("deploy", "fp")
            .with_env("AWS_PROFILE", "deploy")
            .with_credentials_file("/tmp/creds");
        let ctx = creds.to_auth_context();
        assert_eq!(ctx.identity_name, "deploy");
        assert_eq!(ctx.env.get("AWS_PROFILE"), Some(&"deploy".to_string()));
        assert_eq!(ctx.credentials_file, Some(PathBuf::from("/tmp/creds")));
    }
}
