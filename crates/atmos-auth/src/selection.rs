//! Tag-filtered identity selection (`--identity`/`--tags`/`--tag-mode`).
//! When `--identity` names no value, or when a tag filter
//! matches more than one identity, the caller must pick one interactively;
//! `IdentityPicker` is the seam so `atmos-cli` can supply a real terminal
//! prompt while tests supply a scripted choice.

use anyhow::Result;

use atmos_errors::{AtmosError, ErrorKind};
use atmos_types::{AuthConfig, Identity, TagMode};

/// Resolves an ambiguous multi-match identity selection to one identity.
pub trait IdentityPicker {
    fn pick<'a>(&self, candidates: &[&'a Identity]) -> Result<&'a Identity>;
}

/// Picks the first candidate in (already sorted) order; used where a
/// terminal isn't available and `ATMOS_FORCE_TTY` wasn't set, or in tests.
#[derive(Debug, Default)]
pub struct FirstMatchPicker;

impl IdentityPicker for FirstMatchPicker {
    fn pick<'a>(&self, candidates: &[&'a Identity]) -> Result<&'a Identity> {
        candidates.first().copied().ok_or_else(|| {
            AtmosError::new(ErrorKind::NoMatchingIdentity, "no candidate identities to pick from").into()
        })
    }
}

/// Select an identity by exact name, or by tag filter with `mode`, falling
/// back to `picker` when more than one identity matches the filter.
///
/// - exactly one match: return it, no picker involved.
/// - zero matches: `ErrorKind::NoMatchingIdentity`.
/// - more than one match: delegate to `picker`.
pub fn resolve_identity_selection<'a>(
    config: &'a AuthConfig,
    name: Option<&str>,
    tags: &[String],
    mode: TagMode,
    picker: &dyn IdentityPicker,
) -> Result<&'a Identity> {
    if let Some(name) = name {
        return config.identities.get(name).ok_or_else(|| {
            AtmosError::new(ErrorKind::NoMatchingIdentity, format!("no identity named `{name}`"))
                .with_hint("run `atmos describe identities` to see what's configured")
                .into()
        });
    }

    let mut candidates: Vec<&Identity> = config
        .identities
        .values()
        .filter(|identity| {
            if tags.is_empty() {
                true
            } else {
                match mode {
                    TagMode::Any => identity.tag_set.matches_any(tags),
                    TagMode::All => identity.tag_set.matches_all(tags),
                }
            }
        })
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    match candidates.len() {
        0 => Err(AtmosError::new(ErrorKind::NoMatchingIdentity, "no identity matches the given tag filter")
            .with_hint("check --tags/--tag-mode against auth.identities in atmos.yaml")
            .into()),
        1 => Ok(candidates[0]),
        _ => picker.pick(&candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use atmos_types::TagSet;

    fn identity(name: &str, tags: &[&str]) -> Identity {
        Identity {
            name: name.to_string(),
            kind: "aws/assume-role".to_string(),
            via: None,
            principal: BTreeMap::new(),
            tag_set: TagSet { tags: tags.iter().map(|t| t.to_string()).collect(), labels: BTreeMap::new() },
            env: BTreeMap::new(),
        }
    }

    fn config_with(identities: Vec<Identity>) -> AuthConfig {
        let mut config = AuthConfig::default();
        for identity in identities {
            config.identities.insert(identity.name.clone(), identity);
        }
        config
    }

    #[test]
    fn exact_name_wins_regardless_of_tags() {
        let config = config_with(vec![identity("deploy", &["prod"])]);
        let picked = resolve_identity_selection(&config, Some("deploy"), &[], TagMode::Any, &FirstMatchPicker).unwrap();
        assert_eq!(picked.name, "deploy");
    }

    #[test]
    fn unknown_name_is_no_matching_identity() {
        let config = config_with(vec![identity("deploy", &["prod"])]);
        let err = resolve_identity_selection(&config, Some("ghost"), &[], TagMode::Any, &FirstMatchPicker).unwrap_err();
        assert_eq!(AtmosError::downcast(&err).unwrap().kind, ErrorKind::NoMatchingIdentity);
    }

    #[test]
    fn single_tag_match_is_auto_selected() {
        let config = config_with(vec![identity("deploy", &["prod"]), identity("readonly", &["dev"])]);
        let picked = resolve_identity_selection(&config, None, &["prod".to_string()], TagMode::Any, &FirstMatchPicker).unwrap();
        assert_eq!(picked.name, "deploy");
    }

    #[test]
    fn multiple_matches_delegate_to_picker() {
        let config = config_with(vec![identity("a", &["prod"]), identity("b", &["prod"])]);
        let picked = resolve_identity_selection(&config, None, &["prod".to_string()], TagMode::Any, &FirstMatchPicker).unwrap();
        assert_eq!(picked.name, "a");
    }

    #[test]
    fn tag_mode_all_requires_every_tag() {
        let config = config_with(vec![identity("a", &["prod", "eu"]), identity("b", &["prod"])]);
        let picked = resolve_identity_selection(
            &config,
            None,
            &["prod".to_string(), "eu".to_string()],
            TagMode::All,
            &FirstMatchPicker,
        )
        .unwrap();
        assert_eq!(picked.name, "a");
    }

    #[test]
    fn no_match_errors() {
        let config = config_with(vec![identity("a", &["dev"])]);
        let err = resolve_identity_selection(&config, None, &["prod".to_string()], TagMode::Any, &FirstMatchPicker).unwrap_err();
        assert_eq!(AtmosError::downcast(&err).unwrap().kind, ErrorKind::NoMatchingIdentity);
    }
}
