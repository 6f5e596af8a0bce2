//! XDG base-directory resolution honoring Atmos's own overrides.
//!
//! Generalizes the `CARGO_HOME`-fallback chain in `shipper-auth::cargo_home_path`
//! (env var -> `dirs` crate -> hardcoded relative fallback) to the two base
//! dirs Atmos persists under: `ATMOS_XDG_CACHE_HOME` > `XDG_CACHE_HOME`
//! > `~/.cache`, and the config equivalent.

use std::env;
use std::path::PathBuf;

const CACHE_ENV_OVERRIDE: &str = "ATMOS_XDG_CACHE_HOME";
const CACHE_ENV_STANDARD: &str = "XDG_CACHE_HOME";
const CONFIG_ENV_OVERRIDE: &str = "ATMOS_XDG_CONFIG_HOME";
const CONFIG_ENV_STANDARD: &str = "XDG_CONFIG_HOME";

/// `$XDG_CACHE_HOME/atmos`, honoring `ATMOS_XDG_CACHE_HOME` first.
pub fn cache_dir() -> PathBuf {
    resolve(CACHE_ENV_OVERRIDE, CACHE_ENV_STANDARD, dirs::cache_dir)
}

/// `$XDG_CONFIG_HOME/atmos`, honoring `ATMOS_XDG_CONFIG_HOME` first.
pub fn config_dir() -> PathBuf {
    resolve(CONFIG_ENV_OVERRIDE, CONFIG_ENV_STANDARD, dirs::config_dir)
}

fn resolve(
    override_var: &str,
    standard_var: &str,
    fallback: fn() -> Option<PathBuf>,
) -> PathBuf {
    let base = env::var(override_var)
        .ok()
        .or_else(|| env::var(standard_var).ok())
        .map(PathBuf::from)
        .or_else(fallback)
        .unwrap_or_else(|| PathBuf::from(".cache"));
    base.join("atmos")
}

/// `$XDG_CACHE_HOME/atmos/auth/<identity>.json`.
pub fn auth_cache_file(identity_name: &str) -> PathBuf {
    cache_dir().join("auth").join(format!("{identity_name}.json"))
}

/// `$XDG_CACHE_HOME/atmos/aws/<provider>/`.
pub fn aws_identity_cache_dir(provider_name: &str) -> PathBuf {
    cache_dir().join("aws").join(provider_name)
}

/// `$XDG_CACHE_HOME/atmos/sources/<type>/git/...` root for one component type.
pub fn sources_cache_dir(component_type: &str) -> PathBuf {
    cache_dir().join("sources").join(component_type).join("git")
}

/// `$XDG_CACHE_HOME/atmos/releases/releases.json`.
pub fn releases_cache_file() -> PathBuf {
    cache_dir().join("releases").join("releases.json")
}

/// `$XDG_CONFIG_HOME/atmos/docker/config.json` (ECR hook target, ).
pub fn docker_config_file() -> PathBuf {
    config_dir().join("docker").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atmos_override_wins_over_standard_xdg() {
        temp_env::with_vars(
            [
                (CACHE_ENV_OVERRIDE, Some("/atmos-cache")),
                (CACHE_ENV_STANDARD, Some("/xdg-cache")),
            ],
            || {
                assert_eq!(cache_dir(), PathBuf::from("/atmos-cache/atmos"));
            },
        );
    }

    #[test]
    fn standard_xdg_used_when_no_override() {
        temp_env::with_vars(
            [
                (CACHE_ENV_OVERRIDE, None::<&str>),
                (CACHE_ENV_STANDARD, Some("/xdg-cache")),
            ],
            || {
                assert_eq!(cache_dir(), PathBuf::from("/xdg-cache/atmos"));
            },
        );
    }

    #[test]
    fn derived_paths_nest_under_cache_dir() {
        temp_env::with_vars([(CACHE_ENV_OVERRIDE, Some("/atmos-cache"))], || {
            assert_eq!(
                auth_cache_file("deploy"),
                PathBuf::from("/atmos-cache/atmos/auth/deploy.json")
            );
            assert_eq!(
                sources_cache_dir("terraform"),
                PathBuf::from("/atmos-cache/atmos/sources/terraform/git")
            );
        });
    }
}
