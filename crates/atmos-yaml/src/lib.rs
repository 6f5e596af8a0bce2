//! Position-preserving YAML loader.
//!
//! Parses via `yaml-rust2`'s low-level event stream rather than its
//! `YamlLoader` convenience API, because we need our own `Value` tree (not
//! `yaml_rust2::Yaml`) and a provenance position per leaf rather than per
//! document. No repo in this pack does position-preserving YAML parsing, so
//! this crate is the one place the dependency stack departs from direct
//! precedent — grounded instead in `yaml-rust2`'s documented
//! `MarkedEventReceiver` extension point, which exists for exactly this use
//! case (language servers, formatters, anything needing source spans).

mod loader;
mod scalar;

pub use loader::{load, LoadedDocument};
