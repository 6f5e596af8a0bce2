//! Post-auth hooks: side effects that run after a fresh (not
//! cached) credential resolution, never fatal to the command in flight.
//! Grounded on the teacher's `shipper-auth::resolve_token` pattern of
//! folding an auxiliary token lookup into the main auth path, but split out
//! as a pluggable trait since ECR login is one hook among a set the spec
//! leaves open for extension.

use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;

use atmos_types::Identity;

use crate::credentials::Credentials;

/// Runs after an identity's credentials are freshly resolved. Implementors
/// must not fail the surrounding `Authenticate` call: `AuthManager` logs
/// and swallows any `Err` a hook returns.
pub trait PostAuthHook: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, identity: &Identity, credentials: &Credentials) -> Result<()>;
}

/// Fetches a registry auth token for the post-auth ECR login hook. The
/// actual AWS API call is outside this crate's scope (it would pull in an
/// AWS SDK dependency this workspace doesn't otherwise need); callers wire
/// a real implementation in `atmos-core`, and tests exercise the write path
/// against a stub.
pub trait EcrTokenFetcher: Send + Sync {
    fn fetch(&self, credentials: &Credentials) -> Result<EcrToken>;
}

pub struct EcrToken {
    pub registry: String,
    pub username: String,
    pub password: String,
}

/// Always errors; the default fetcher until `atmos-core` wires a real one.
#[derive(Debug, Default)]
pub struct UnconfiguredEcrTokenFetcher;

impl EcrTokenFetcher for UnconfiguredEcrTokenFetcher {
    fn fetch(&self, _credentials: &Credentials) -> Result<EcrToken> {
        anyhow::bail!("no ECR token fetcher configured")
    }
}

/// Writes a docker `config.json` auth entry for identities with
/// `principal.ecr_login: true` ("identities may opt into an ECR
/// login post-auth hook").
pub struct EcrLoginHook<F: EcrTokenFetcher> {
    fetcher: F,
}

impl<F: EcrTokenFetcher> EcrLoginHook<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl<F: EcrTokenFetcher> PostAuthHook for EcrLoginHook<F> {
    fn name(&self) -> &str {
        "ecr-login"
    }

    fn run(&self, identity: &Identity, credentials: &Credentials) -> Result<()> {
        if !identity.ecr_login_enabled() {
            return Ok(());
        }
        let token = self.fetcher.fetch(credentials)?;
        write_docker_config(&token)
    }
}

#[derive(Serialize)]
struct DockerConfig {
    auths: BTreeMap<String, DockerAuthEntry>,
}

#[derive(Serialize)]
struct DockerAuthEntry {
    auth: String,
}

fn write_docker_config(token: &EcrToken) -> Result<()> {
    use base64::Engine;

    let path = atmos_xdg::docker_config_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut auths = if path.exists() {
        let existing = fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str::<DockerConfig>(&existing).map(|c| c.auths).unwrap_or_default()
    } else {
        BTreeMap::new()
    };

    let basic = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", token.username, token.password));
    auths.insert(token.registry.clone(), DockerAuthEntry { auth: basic });

    let config = DockerConfig { auths };
    let json = serde_json::to_string_pretty(&config).context("failed to serialize docker config")?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))
}
