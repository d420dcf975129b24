//! Package selectors
//!
//! Command line arguments name packages either by their package name or by
//! a directory, relative to the current directory or to the root.

use std::path::Path;

use crate::core::package::{normalize_directory, PackageInfos};
use crate::error::SelectionError;

/// Resolve one selector to a package directory
pub fn resolve_selector(
    selector: &str,
    cwd: &Path,
    root: &Path,
    package_infos: &PackageInfos,
) -> Result<String, SelectionError> {
    if let Some(info) = package_infos.values().find(|info| info.name == selector) {
        return Ok(info.directory().to_string());
    }

    let from_cwd = cwd
        .join(selector)
        .canonicalize()
        .ok()
        .zip(root.canonicalize().ok())
        .and_then(|(path, root)| path.strip_prefix(root).ok().map(normalize_directory));

    let from_root = Some(normalize_directory(Path::new(selector)));

    from_cwd
        .into_iter()
        .chain(from_root)
        .find(|directory| package_infos.contains_key(directory))
        .ok_or_else(|| SelectionError::UnknownPackage {
            selector: selector.to_string(),
        })
}

/// Resolve selectors; no selectors selects every package
pub fn resolve_selectors(
    selectors: &[String],
    cwd: &Path,
    root: &Path,
    package_infos: &PackageInfos,
) -> Result<Vec<String>, SelectionError> {
    if selectors.is_empty() {
        return Ok(package_infos.keys().cloned().collect());
    }

    let mut directories = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let directory = resolve_selector(selector, cwd, root, package_infos)?;
        if !directories.contains(&directory) {
            directories.push(directory);
        }
    }
    Ok(directories)
}
