//! Target-path precedence resolution: "(1) `working_directory`
//! override; (2) existing local component directory (skip vendoring);
//! (3) default `components/<type>/<name>`. After workdir integration, (1)
//! wins unconditionally; otherwise (2) > (3)."

use std::path::Path;

use atmos_types::{TargetPath, TargetPathOrigin};

/// Resolve where a component's source tree should live on disk.
///
/// `working_directory` is the per-component `metadata.workdir`-style
/// override, if configured; `base_path` is the `<root>/components/<type>`
/// directory this component type vendors under.
pub fn resolve_target_path(
    working_directory: Option<&Path>,
    base_path: &Path,
    component_name: &str,
) -> TargetPath {
    if let Some(dir) = working_directory {
        return TargetPath { path: dir.to_path_buf(), origin: TargetPathOrigin::WorkingDirectoryOverride };
    }

    let default_path = base_path.join(component_name);
    if default_path.exists() {
        return TargetPath { path: default_path, origin: TargetPathOrigin::ExistingLocalComponent };
    }

    TargetPath { path: default_path, origin: TargetPathOrigin::Default }
}

/// Whether `path` should be treated as "already vendored, skip fetch"
/// under the precedence rule in [`resolve_target_path`]: only an
/// already-existing local component directory short-circuits vendoring;
/// a working-directory override or a not-yet-created default path does not.
pub fn skip_vendoring(target: &TargetPath) -> bool {
    matches!(target.origin, TargetPathOrigin::ExistingLocalComponent)
}
