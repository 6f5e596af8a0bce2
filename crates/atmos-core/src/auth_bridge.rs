//! Bridges `atmos_auth::AuthManager` into the `StackAuthResolver` seam the
//! compiler calls once per stack. The resolved
//! identity is whatever the command line picked before compilation started
//! (`--identity`/`ATMOS_IDENTITY`) — stacks don't currently carry their own
//! identity binding, so every stack in one compile run shares the same
//! resolved `AuthContext`.

use std::sync::Arc;

use anyhow::Result;
use atmos_auth::{AuthCallContext, AuthManager};
use atmos_compiler::compiler::StackAuthResolver;
use atmos_types::AuthContext;

pub struct CoreAuthResolver {
    identity: Option<String>,
    manager: Arc<AuthManager>,
    call_ctx: AuthCallContext,
}

impl CoreAuthResolver {
    pub fn new(identity: Option<String>, manager: Arc<AuthManager>, call_ctx: AuthCallContext) -> Self {
        Self { identity, manager, call_ctx }
    }
}

impl StackAuthResolver for CoreAuthResolver {
    fn resolve_for_stack(&self, stack: &str) -> Result<Option<AuthContext>> {
        let Some(identity) = &self.identity else {
            return Ok(None);
        };
        tracing::debug!(stack, identity, "resolving auth context for stack compile");
        let (auth_context, _info) = self.manager.authenticate(identity, &self.call_ctx)?;
        Ok(Some(auth_context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmos_auth::CredentialStore;
    use atmos_registry::Registry;
    use atmos_types::AuthConfig;

    #[test]
    fn no_identity_selected_resolves_to_none() {
        let manager = Arc::new(AuthManager::new(AuthConfig::default(), Arc::new(Registry::new()), CredentialStore::new()));
        let resolver = CoreAuthResolver::new(None, manager, AuthCallContext::default());
        assert!(resolver.resolve_for_stack("prod").unwrap().is_none());
    }
}
