//! Identity chain resolution: identities form a DAG (chain) rooted at
//! identities with no `via`; cycles are fatal.
//!
//! Modeled the way the compiler's import/inheritance graphs are: store as
//! `name -> parent-name` plus a visited-set during traversal, detect
//! cycles on the fly, never materialize a cyclic object graph — there is
//! no separate graph-building pass here, just a recursive walk with an
//! explicit `visiting` stack.

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{AuthConfig, Value};

use crate::credentials::{Credentials, fingerprint};
use crate::resolver::{AuthCallContext, AuthResolverRegistry};
use crate::store::CredentialStore;

/// The outcome of resolving one node in the chain: the credential, and
/// whether it came from a live upstream exchange (`true`) or a cache hit
/// (`false`). Callers use the flag to decide whether a post-auth hook or
/// an "authenticated" log line is warranted.
pub struct Resolved {
    pub credentials: Credentials,
    pub fresh: bool,
}

/// Resolve `target` (an identity name or a bare provider name) to
/// credentials, walking `via` chains as needed and caching every node
/// visited along the way.
pub fn resolve(
    target: &str,
    config: &AuthConfig,
    registry: &AuthResolverRegistry,
    store: &CredentialStore,
    ctx: &AuthCallContext,
) -> Result<Resolved> {
    let mut visiting = Vec::new();
    resolve_inner(target, config, registry, store, ctx, &mut visiting)
}

fn resolve_inner(
    target: &str,
    config: &AuthConfig,
    registry: &AuthResolverRegistry,
    store: &CredentialStore,
    ctx: &AuthCallContext,
    visiting: &mut Vec<String>,
) -> Result<Resolved> {
    if visiting.contains(&target.to_string()) {
        let mut path = visiting.clone();
        path.push(target.to_string());
        return Err(AtmosError::new(ErrorKind::CyclicAuthChain, format!("cyclic auth chain: {}", path.join(" -> ")))
            .with_hint("an identity's `via` must not (transitively) point back at itself")
            .into());
    }

    if let Some(identity) = config.identities.get(target) {
        let fp = fingerprint(&identity.principal);
        if let Some(cached) = store.load(target)? {
            if cached.principal_fingerprint == fp && !cached.is_expired() {
                return Ok(Resolved { credentials: cached, fresh: false });
            }
        }

        visiting.push(target.to_string());
        let caller = match &identity.via {
            Some(via) => resolve_inner(via, config, registry, store, ctx, visiting)?.credentials,
            None => {
                return Err(AtmosError::new(
                    ErrorKind::InvalidConfig,
                    format!("identity `{target}` has no `via` and is not itself a provider"),
                )
                .with_hint("every identity must chain to a provider, directly or transitively")
                .into());
            }
        };
        visiting.pop();

        let principal = Value::Map(identity.principal.clone());
        let resolver = registry.new_instance(&identity.kind, &principal)?;
        let mut creds = resolver.authenticate(Some(&caller), ctx)?;
        creds.identity_name = target.to_string();
        creds.principal_fingerprint = fp;
        store.save(target, &creds)?;
        return Ok(Resolved { credentials: creds, fresh: true });
    }

    if let Some(provider) = config.providers.get(target) {
        let fp = fingerprint(&provider.config);
        if let Some(cached) = store.load(target)? {
            if cached.principal_fingerprint == fp && !cached.is_expired() {
                return Ok(Resolved { credentials: cached, fresh: false });
            }
        }

        let principal = Value::Map(provider.config.clone());
        let resolver = registry.new_instance(&provider.kind, &principal)?;
        let mut creds = resolver.authenticate(None, ctx)?;
        creds.identity_name = target.to_string();
        creds.principal_fingerprint = fp;
        store.save(target, &creds)?;
        return Ok(Resolved { credentials: creds, fresh: true });
    }

    Err(AtmosError::new(ErrorKind::NotFound, format!("no identity or provider named `{target}`"))
        .with_hint("check atmos.yaml's auth.identities and auth.providers sections")
        .into())
}
