//! Generic kind-to-factory registry kernel.
//!
//! Every pluggable subsystem in this workspace — component providers, auth
//! identity kinds, workflow step kinds — shares the same shape: a map from a
//! string `kind` to a factory, guarded by a reader/writer lock so lookups
//! during concurrent stack compilation never block each other. Modeled on
//! the dispatch-by-kind idiom in the teacher's config-to-implementation
//! routing (`shipper::registry_micro`), generalized from a fixed match
//! expression into data that call sites register at startup.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::Value;

/// A factory constructs an instance of `T` from its own kind string and a
/// config value. The kind is passed back in so one factory fn can serve
/// related kinds (e.g. `aws/sso` and `aws/assume-role` sharing a builder).
pub type Factory<T> = Arc<dyn Fn(&str, &Value) -> Result<T> + Send + Sync>;

/// Thread-safe `kind -> Factory<T>` map.
pub struct Registry<T> {
    factories: RwLock<BTreeMap<String, Factory<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `factory` under `kind`. Re-registration is allowed and
    /// last-wins, which is required for tests and plugin overrides. An
    /// empty kind is a programmer error: it panics rather than surfacing as
    /// a user-facing error, since registration happens at startup as a side
    /// effect of loading a module, never from user input.
    pub fn register(&self, kind: impl Into<String>, factory: Factory<T>) {
        let kind = kind.into();
        assert!(!kind.is_empty(), "registry: kind must not be empty");
        self.factories
            .write()
            .expect("registry lock poisoned")
            .insert(kind, factory);
    }

    /// Look up the factory registered for `kind`, if any.
    pub fn get(&self, kind: &str) -> Option<Factory<T>> {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .get(kind)
            .cloned()
    }

    /// Construct an instance of `T` via the factory registered for `kind`.
    /// Fails with `ErrorKind::UnsupportedKind` and the list of valid kinds
    /// if `kind` was never registered.
    pub fn new_instance(&self, kind: &str, config: &Value) -> Result<T> {
        match self.get(kind) {
            Some(factory) => factory(kind, config),
            None => {
                let known = self.list_kinds();
                Err(AtmosError::new(
                    ErrorKind::UnsupportedKind,
                    format!("unsupported kind: {kind}"),
                )
                .with_hint(if known.is_empty() {
                    "no kinds are registered".to_string()
                } else {
                    format!("registered kinds: {}", known.join(", "))
                })
                .into())
            }
        }
    }

    /// All registered kinds, sorted (the map is a `BTreeMap`, so this is
    /// just the keys in iteration order).
    pub fn list_kinds(&self) -> Vec<String> {
        self.factories
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Clear every registration. Test-only: production code only ever adds
    /// to a registry, never resets it mid-run.
    pub fn reset(&self) {
        self.factories
            .write()
            .expect("registry lock poisoned")
            .clear();
    }
}
