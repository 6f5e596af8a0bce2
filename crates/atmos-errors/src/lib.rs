//! Sentinel error taxonomy.
//!
//! The teacher crate (`shipper`) declares `thiserror` as a dependency but
//! never derives it — every fallible path returns `anyhow::Result` with
//! `.context(...)` chains. That idiom is right for the bulk of this
//! workspace too (file IO, subprocess failures, parse errors), but callers
//! need to *match* on a closed set of ~20 named error kinds to pick an
//! exit code and to render a `Hint:`/`Context:` block.
//! `AtmosError` is the one place we reach for `thiserror`: everything else
//! keeps using `anyhow`, and constructs/wraps an `AtmosError` only at the
//! boundary that needs to inspect the kind.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// One of the sentinel kinds named in , each a fatal-by-default
/// condition with its own exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("invalid configuration")]
    InvalidConfig,
    #[error("unsupported kind")]
    UnsupportedKind,
    #[error("cyclic import")]
    CyclicImport,
    #[error("cyclic inheritance")]
    CyclicInheritance,
    #[error("cyclic auth chain")]
    CyclicAuthChain,
    #[error("cyclic dependency")]
    CyclicDependency,
    #[error("authentication required")]
    AuthRequired,
    #[error("authentication failed")]
    AuthFailed,
    #[error("authentication expired")]
    AuthExpired,
    #[error("no matching identity")]
    NoMatchingIdentity,
    #[error("source provisioning failed")]
    SourceProvision,
    #[error("source not found")]
    SourceNotFound,
    #[error("source access denied")]
    SourceAccessDenied,
    #[error("template evaluation failed")]
    TemplateEval,
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("resource conflict")]
    ResourceConflict,
    #[error("a TTY is required")]
    TtyRequired,
    #[error("network error")]
    Network,
    #[error("operation timed out")]
    Timeout,
    #[error("permission denied")]
    PermissionDenied,
}

impl ErrorKind {
    /// Exit code mapping per 0 success (n/a here), 1 generic,
    /// 2 configuration error, 3 permission/auth, 4 resource conflict, 5 network.
    pub fn exit_code(self) -> i32 {
        use ErrorKind::*;
        match self {
            InvalidConfig | UnsupportedKind | CyclicImport | CyclicInheritance
            | CyclicAuthChain | CyclicDependency | TemplateEval => 2,
            AuthRequired | AuthFailed | AuthExpired | NoMatchingIdentity | PermissionDenied => 3,
            AlreadyExists | ResourceConflict => 4,
            Network | Timeout => 5,
            SourceProvision | SourceNotFound | SourceAccessDenied | NotFound | TtyRequired => 1,
        }
    }
}

/// A rendered sentinel error: the kind, an optional wrapped cause, free-form
/// diagnostic context, and an optional operator-facing hint.
///
/// `Display` renders exactly the shape asks for:
/// ```text
/// <summary>
///   Explanation: <explanation>
///   Hint: <hint>
///   Context:
///     key: value
/// ```
#[derive(Debug, Error)]
pub struct AtmosError {
    pub kind: ErrorKind,
    pub summary: String,
    pub explanation: Option<String>,
    pub hint: Option<String>,
    pub context: BTreeMap<String, String>,
    #[source]
    pub cause: Option<anyhow::Error>,
}

impl AtmosError {
    pub fn new(kind: ErrorKind, summary: impl Into<String>) -> Self {
        Self {
            kind,
            summary: summary.into(),
            explanation: None,
            hint: None,
            context: BTreeMap::new(),
            cause: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Find the `AtmosError` in an `anyhow::Error` chain, if one was wrapped
    /// in at some boundary. Used by `atmos-cli` to pick an exit code without
    /// every intermediate layer needing to know about sentinels.
    pub fn downcast(err: &anyhow::Error) -> Option<&AtmosError> {
        err.chain().find_map(|e| e.downcast_ref::<AtmosError>())
    }
}

impl fmt::Display for AtmosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        if let Some(explanation) = &self.explanation {
            writeln!(f, "  Explanation: {explanation}")?;
        }
        if let Some(hint) = &self.hint {
            writeln!(f, "  Hint: {hint}")?;
        }
        if !self.context.is_empty() {
            writeln!(f, "  Context:")?;
            for (k, v) in &self.context {
                writeln!(f, "    {k}: {v}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;

    #[test]
    fn exit_codes_match_taxonomy() {
        assert_eq!(ErrorKind::InvalidConfig.exit_code(), 2);
        assert_eq!(ErrorKind::AuthRequired.exit_code(), 3);
        assert_eq!(ErrorKind::ResourceConflict.exit_code(), 4);
        assert_eq!(ErrorKind::Network.exit_code(), 5);
        assert_eq!(ErrorKind::NotFound.exit_code(), 1);
    }

    #[test]
    fn renders_full_block() {
        let err = AtmosError::new(ErrorKind::UnsupportedKind, "unsupported identity kind: aws/bogus")
            .with_explanation("no identity factory is registered for this kind")
            .with_hint("run `atmos describe` to see registered kinds")
            .with_context("registered_kinds", "aws/sso, aws/assume-role");

        let rendered = err.to_string();
        assert!(rendered.starts_with("unsupported identity kind: aws/bogus\n"));
        assert!(rendered.contains("  Explanation: "));
        assert!(rendered.contains("  Hint: "));
        assert!(rendered.contains("    registered_kinds: aws/sso, aws/assume-role"));
    }

    #[test]
    fn downcast_finds_wrapped_sentinel() {
        let sentinel = AtmosError::new(ErrorKind::CyclicImport, "cycle: a -> b -> a");
        let wrapped: anyhow::Error = anyhow::Error::new(sentinel).context("while compiling stack prod");

        let found = AtmosError::downcast(&wrapped).expect("sentinel should be in chain");
        assert_eq!(found.kind, ErrorKind::CyclicImport);
    }

    #[test]
    fn downcast_none_for_plain_anyhow() {
        let err = anyhow::anyhow!("plain io error");
        assert!(AtmosError::downcast(&err).is_none());
    }
}
