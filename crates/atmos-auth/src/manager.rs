//! `AuthManager`: the facade every command-path goes through to
//! turn an identity name into usable credentials.
//!
//! Singleflight coalescing follows the same "short-held outer lock hands
//! out a per-key inner lock" idiom as `atmos-lock::FileLock` uses for
//! cross-process locking, just in-process and per-identity-name: N
//! concurrent Authenticate calls for the same id trigger exactly one
//! upstream exchange.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::warn;

use atmos_types::{AuthConfig, AuthContext};

use crate::chain::{self, Resolved};
use crate::posthook::PostAuthHook;
use crate::resolver::{AuthCallContext, AuthResolverRegistry};
use crate::store::CredentialStore;

/// What a successful `Authenticate` reports back to the caller:
/// `GetStackInfo`'s per-identity shape, reused here for a single call.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub identity_name: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub from_cache: bool,
}

pub struct AuthManager {
    config: AuthConfig,
    registry: Arc<AuthResolverRegistry>,
    store: CredentialStore,
    posthooks: Vec<Arc<dyn PostAuthHook>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuthManager {
    pub fn new(config: AuthConfig, registry: Arc<AuthResolverRegistry>, store: CredentialStore) -> Self {
        Self {
            config,
            registry,
            store,
            posthooks: Vec::new(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_posthook(mut self, hook: Arc<dyn PostAuthHook>) -> Self {
        self.posthooks.push(hook);
        self
    }

    /// Resolve `identity_name` to credentials, coalescing concurrent calls
    /// for the same identity into a single upstream exchange.
    pub fn authenticate(&self, identity_name: &str, ctx: &AuthCallContext) -> Result<(AuthContext, AuthInfo)> {
        let lane = self.lane_for(identity_name);
        let _guard = lane.lock().expect("auth manager lane poisoned");

        let Resolved { credentials, fresh } = chain::resolve(identity_name, &self.config, &self.registry, &self.store, ctx)?;

        if fresh {
            if let Some(identity) = self.config.identities.get(identity_name) {
                for hook in &self.posthooks {
                    if let Err(err) = hook.run(identity, &credentials) {
                        warn!(hook = hook.name(), identity = identity_name, error = %err, "post-auth hook failed, continuing");
                    }
                }
            }
        }

        let info = AuthInfo {
            identity_name: identity_name.to_string(),
            expires_at: credentials.expires_at(),
            from_cache: !fresh,
        };
        Ok((credentials.to_auth_context(), info))
    }

    /// Force a fresh resolution regardless of cache state: backs
    /// `--identity` with an explicit refresh, and `atmos auth refresh`.
    pub fn refresh(&self, identity_name: &str, ctx: &AuthCallContext) -> Result<(AuthContext, AuthInfo)> {
        self.store.clear(identity_name)?;
        self.authenticate(identity_name, ctx)
    }

    /// Drop the cached credential for `identity_name` (`Logout`).
    pub fn logout(&self, identity_name: &str) -> Result<()> {
        self.store.clear(identity_name)
    }

    /// Every identity/provider name currently cached, for `atmos auth
    /// logout --all` and inspection commands.
    pub fn cached_identities(&self) -> Result<Vec<String>> {
        self.store.list_cached()
    }

    /// Per-identity status without triggering a resolution: whether a
    /// cached credential exists and whether it's still valid. Backs
    /// `GetStackInfo`.
    pub fn stack_info(&self, identity_name: &str) -> Result<Option<AuthInfo>> {
        Ok(self.store.load(identity_name)?.map(|creds| AuthInfo {
            identity_name: identity_name.to_string(),
            expires_at: creds.expires_at(),
            from_cache: !creds.is_expired(),
        }))
    }

    fn lane_for(&self, identity_name: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().expect("auth manager inflight map poisoned");
        inflight.entry(identity_name.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
