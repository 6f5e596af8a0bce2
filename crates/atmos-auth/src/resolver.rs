//! The extensibility seam for identity/provider kinds.
//!
//! One registry (`atmos-registry`'s generic kernel, same pattern the
//! component provider and workflow step registries use) maps a kind
//! string to a factory that builds an `AuthResolver`. Provider kinds
//! (`aws-sso`) and identity kinds (`aws/assume-role`) share the same
//! table and the same trait: a provider resolver is simply one that never
//! receives caller credentials (it is a DAG root), while an identity
//! resolver expects `Some(caller)` — the chain walker in `chain.rs`
//! enforces which is which, not the registry.

use std::sync::Arc;

use anyhow::Result;

use atmos_process::Cancellation;

use crate::credentials::Credentials;

/// Constructs and runs authentication for one registered kind.
pub trait AuthResolver: Send + Sync {
    /// `caller` is `Some` when resolving a chained identity (`J`'s
    /// credentials are the caller credentials for obtaining `I`'s
    /// credentials), `None` when resolving a root provider.
    fn authenticate(&self, caller: Option<&Credentials>, ctx: &AuthCallContext) -> Result<Credentials>;
}

/// Per-call context threaded through resolution: a cancellation token so
/// a device-flow prompt or SSO poll can be aborted ("the core
/// honors cancellation at every network boundary").
#[derive(Debug, Clone, Default)]
pub struct AuthCallContext {
    pub cancellation: Cancellation,
}

/// `kind -> Arc<dyn AuthResolver>` factory table.
pub type AuthResolverRegistry = atmos_registry::Registry<Arc<dyn AuthResolver>>;
