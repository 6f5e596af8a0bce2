//! Built-in identity/provider kinds (scenario 3's three-link chain:
//! `aws-sso` provider → `dev-admin` identity via aws-sso → `deploy`
//! identity via dev-admin). Each kind shells out to the `aws` CLI rather
//! than pulling in an AWS SDK dependency the rest of the workspace has no
//! other use for (same call applies to `atmos-dag`'s non-goals).

use std::sync::Arc;

use anyhow::{Context as _, Result};
use atmos_auth::{AuthCallContext, AuthResolver, AuthResolverRegistry, Credentials, EcrToken, EcrTokenFetcher};
use atmos_process::RunOptions;
use atmos_types::Value;
use chrono::{DateTime, Utc};

/// Credentials taken verbatim from `atmos.yaml`'s principal config: no
/// network call, useful for local development and tests. Registered under
/// kind `static`.
struct StaticResolver {
    env: std::collections::BTreeMap<String, String>,
}

impl AuthResolver for StaticResolver {
    fn authenticate(&self, _caller: Option<&Credentials>, _ctx: &AuthCallContext) -> Result<Credentials> {
        let mut creds = Credentials::new("static", "static");
        for (k, v) in &self.env {
            creds = creds.with_env(k, v);
        }
        Ok(creds)
    }
}

/// Exports an already-active AWS SSO profile's credentials via
/// `aws configure export-credentials`. A DAG root: never receives caller
/// credentials. Registered under kind `aws-sso`.
struct AwsSsoResolver {
    profile: String,
}

impl AuthResolver for AwsSsoResolver {
    fn authenticate(&self, _caller: Option<&Credentials>, ctx: &AuthCallContext) -> Result<Credentials> {
        let opts = RunOptions::new().with_cancellation(ctx.cancellation.clone());
        let output = atmos_process::run_checked(
            "aws",
            &["configure", "export-credentials", "--profile", &self.profile, "--format", "process"],
            &opts,
        )
        .with_context(|| format!("exporting AWS SSO credentials for profile `{}`", self.profile))?;
        aws_credentials_to_atmos(&output.stdout)
    }
}

/// Assumes an IAM role using the caller's credentials as the calling
/// principal. Registered under kind `aws/assume-role`.
struct AssumeRoleResolver {
    role_arn: String,
    session_name: String,
}

impl AuthResolver for AssumeRoleResolver {
    fn authenticate(&self, caller: Option<&Credentials>, ctx: &AuthCallContext) -> Result<Credentials> {
        let caller = caller.ok_or_else(|| {
            atmos_errors::AtmosError::new(atmos_errors::ErrorKind::InvalidConfig, "aws/assume-role requires a `via` chain")
        })?;

        let mut opts = RunOptions::new().with_cancellation(ctx.cancellation.clone());
        for (k, v) in &caller.env {
            opts = opts.with_env(k, v);
        }
        let output = atmos_process::run_checked(
            "aws",
            &[
                "sts",
                "assume-role",
                "--role-arn",
                &self.role_arn,
                "--role-session-name",
                &self.session_name,
                "--output",
                "json",
            ],
            &opts,
        )
        .with_context(|| format!("assuming role `{}`", self.role_arn))?;
        assume_role_output_to_atmos(&output.stdout)
    }
}

fn aws_credentials_to_atmos(stdout: &str) -> Result<Credentials> {
    let parsed: serde_json::Value = serde_json::from_str(stdout).context("parsing `aws configure export-credentials` output")?;
    let mut creds = Credentials::new("aws-sso", "aws-sso");
    if let Some(v) = parsed.get("AccessKeyId").and_then(|v| v.as_str()) {
        creds = creds.with_env("AWS_ACCESS_KEY_ID", v);
    }
    if let Some(v) = parsed.get("SecretAccessKey").and_then(|v| v.as_str()) {
        creds = creds.with_env("AWS_SECRET_ACCESS_KEY", v);
    }
    if let Some(v) = parsed.get("SessionToken").and_then(|v| v.as_str()) {
        creds = creds.with_env("AWS_SESSION_TOKEN", v);
    }
    if let Some(expiration) = parsed.get("Expiration").and_then(|v| v.as_str()) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(expiration) {
            creds = creds.with_expires_at(dt.with_timezone(&Utc));
        }
    }
    Ok(creds)
}

fn assume_role_output_to_atmos(stdout: &str) -> Result<Credentials> {
    let parsed: serde_json::Value = serde_json::from_str(stdout).context("parsing `aws sts assume-role` output")?;
    let block = parsed.get("Credentials").context("assume-role response missing `Credentials`")?;
    let mut creds = Credentials::new("assume-role", "assume-role");
    if let Some(v) = block.get("AccessKeyId").and_then(|v| v.as_str()) {
        creds = creds.with_env("AWS_ACCESS_KEY_ID", v);
    }
    if let Some(v) = block.get("SecretAccessKey").and_then(|v| v.as_str()) {
        creds = creds.with_env("AWS_SECRET_ACCESS_KEY", v);
    }
    if let Some(v) = block.get("SessionToken").and_then(|v| v.as_str()) {
        creds = creds.with_env("AWS_SESSION_TOKEN", v);
    }
    if let Some(expiration) = block.get("Expiration").and_then(|v| v.as_str()) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(expiration) {
            creds = creds.with_expires_at(dt.with_timezone(&Utc));
        }
    }
    Ok(creds)
}

fn string_field(principal: &Value, key: &str, default: &str) -> String {
    principal
        .as_map()
        .and_then(|m| m.get(key))
        .and_then(|v| if let Value::String(s) = v { Some(s.clone()) } else { None })
        .unwrap_or_else(|| default.to_string())
}

pub fn register_builtin_auth_resolvers(registry: &AuthResolverRegistry) {
    registry.register(
        "static",
        Arc::new(|_kind, principal: &Value| {
            let env = principal
                .as_map()
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| if let Value::String(s) = v { Some((k.clone(), s.clone())) } else { None })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Arc::new(StaticResolver { env }) as Arc<dyn AuthResolver>)
        }),
    );

    registry.register(
        "aws-sso",
        Arc::new(|_kind, principal: &Value| {
            let profile = string_field(principal, "profile", "default");
            Ok(Arc::new(AwsSsoResolver { profile }) as Arc<dyn AuthResolver>)
        }),
    );

    registry.register(
        "aws/assume-role",
        Arc::new(|_kind, principal: &Value| {
            let role_arn = string_field(principal, "role_arn", "");
            if role_arn.is_empty() {
                anyhow::bail!("aws/assume-role identity is missing principal.role_arn");
            }
            let session_name = string_field(principal, "session_name", "atmos");
            Ok(Arc::new(AssumeRoleResolver { role_arn, session_name }) as Arc<dyn AuthResolver>)
        }),
    );
}

/// Fetches an ECR auth token via `aws ecr get-login-password`, for
/// `EcrLoginHook` (opt-in `principal.ecr_login: true`).
pub struct AwsCliEcrTokenFetcher {
    pub registry: String,
}

impl EcrTokenFetcher for AwsCliEcrTokenFetcher {
    fn fetch(&self, credentials: &Credentials) -> Result<EcrToken> {
        let mut opts = RunOptions::new();
        for (k, v) in &credentials.env {
            opts = opts.with_env(k, v);
        }
        let output = atmos_process::run_checked("aws", &["ecr", "get-login-password"], &opts).context("fetching ECR login password")?;
        Ok(EcrToken { registry: self.registry.clone(), username: "AWS".to_string(), password: output.stdout.trim().to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_sso_output_maps_known_fields() {
        let stdout = r#"{"AccessKeyId":"AKIA","SecretAccessKey":"secret","SessionToken":"tok","Expiration":"2030-01-01T00:00:00Z"}"#;
        let creds = aws_credentials_to_atmos(stdout).unwrap();
        assert_eq!(creds.env.get("AWS_ACCESS_KEY_ID"), Some(&"AKIA".to_string()));
        assert!(creds.expires_at().is_some());
    }

    #[test]
    fn assume_role_output_nests_under_credentials_key() {
        let stdout = r#"{"Credentials":{"AccessKeyId":"AKIA2","SecretAccessKey":"secret2","SessionToken":"tok2","Expiration":"2030-01-01T00:00:00Z"}}"#;
        let creds = assume_role_output_to_atmos(stdout).unwrap();
        assert_eq!(creds.env.get("AWS_ACCESS_KEY_ID"), Some(&"AKIA2".to_string()));
    }

    #[test]
    fn static_resolver_copies_string_principal_fields_into_env() {
        let mut principal = std::collections::BTreeMap::new();
        principal.insert("AWS_PROFILE".to_string(), Value::String("dev".to_string()));
        let resolver = StaticResolver { env: [("AWS_PROFILE".to_string(), "dev".to_string())].into_iter().collect() };
        let creds = resolver.authenticate(None, &AuthCallContext::default()).unwrap();
        assert_eq!(creds.env.get("AWS_PROFILE"), Some(&"dev".to_string()));
        let _ = principal;
    }
}
