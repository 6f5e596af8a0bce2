//! Identity chain resolution, credential caching, singleflight
//! coalescing, and post-auth hooks.
//!
//! `AuthManager` is the entry point: it owns an `AuthResolverRegistry`
//! (one factory per identity/provider kind, reusing `atmos-registry`'s
//! generic kernel), a `CredentialStore` (the on-disk cache under
//! `$XDG_CACHE_HOME/atmos/auth/`), and any `PostAuthHook`s to run after a
//! fresh resolution. `chain::resolve` does the recursive `via`-chain walk;
//! `selection` picks an identity out of a tag filter when the caller
//! didn't name one explicitly.

mod chain;
mod credentials;
mod manager;
mod posthook;
mod resolver;
mod selection;
mod store;

pub use chain::{resolve, Resolved};
pub use credentials::{fingerprint, Credentials};
pub use manager::{AuthInfo, AuthManager};
pub use posthook::{EcrLoginHook, EcrToken, EcrTokenFetcher, PostAuthHook, UnconfiguredEcrTokenFetcher};
pub use resolver::{AuthCallContext, AuthResolver, AuthResolverRegistry};
pub use selection::{resolve_identity_selection, FirstMatchPicker, IdentityPicker};
pub use store::CredentialStore;
