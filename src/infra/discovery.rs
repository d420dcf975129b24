//! Package discovery
//!
//! Finds the package.json files under the repository root, or reads the
//! directories listed in the configuration, and resolves the dependency
//! names between them.

use std::collections::BTreeMap;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use crate::config::defaults::{IGNORED_DIRS, MANIFEST_FILE_NAME};
use crate::core::config::BiltConfig;
use crate::core::manifest::Manifest;
use crate::core::package::{
    normalize_directory, resolve_package_infos, Package, PackageInfo, PackageInfos, UnresolvedPackage,
    ROOT_DIRECTORY,
};
use crate::error::DiscoveryError;

/// Packages of a repository
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Package infos keyed by directory
    pub package_infos: PackageInfos,
    /// Parsed manifests keyed by directory
    pub manifests: BTreeMap<String, Manifest>,
}

impl Workspace {
    /// Directory of the package with the given name
    pub fn directory_of(&self, name: &str) -> Option<&str> {
        self.package_infos
            .values()
            .find(|info| info.name == name)
            .map(PackageInfo::directory)
    }
}

/// Discover the packages of the repository at `root`
pub fn discover(root: &Path, config: &BiltConfig) -> Result<Workspace, DiscoveryError> {
    let directories = match &config.packages {
        Some(listed) => listed
            .iter()
            .map(|dir| {
                let directory = normalize_directory(Path::new(dir));
                if root.join(&directory).join(MANIFEST_FILE_NAME).is_file() {
                    Ok(directory)
                } else {
                    Err(DiscoveryError::MissingManifest { directory })
                }
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => walk_manifests(root, &config.ignore)?,
    };

    let mut manifests = BTreeMap::new();
    let mut unresolved = Vec::new();
    for directory in directories {
        let path = root.join(&directory).join(MANIFEST_FILE_NAME);
        let manifest = Manifest::load(&path)?;
        let name = manifest.require_name(&path)?.to_string();
        tracing::debug!("Found package {name} in {directory}");

        unresolved.push(UnresolvedPackage {
            package: Package::new(directory.clone()),
            name,
            dependency_names: manifest.dependency_names().into_iter().collect(),
        });
        manifests.insert(directory, manifest);
    }

    let package_infos = resolve_package_infos(unresolved)?;
    tracing::info!("Discovered {} packages", package_infos.len());

    Ok(Workspace {
        package_infos,
        manifests,
    })
}

fn is_skipped(entry: &DirEntry, ignore: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || IGNORED_DIRS.contains(&&*name) || ignore.iter().any(|i| i.as_str() == name)
}

/// Directories below `root` holding a package.json
///
/// The root's own package.json describes the workspace, not a package, and
/// is skipped.
fn walk_manifests(root: &Path, ignore: &[String]) -> Result<Vec<String>, DiscoveryError> {
    let mut directories = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry, ignore));

    for entry in walker {
        let entry = entry.map_err(|e| DiscoveryError::WalkError {
            path: e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf),
            error: e.to_string(),
        })?;
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST_FILE_NAME {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let Ok(relative) = parent.strip_prefix(root) else {
            continue;
        };
        let directory = normalize_directory(relative);
        if directory != ROOT_DIRECTORY {
            directories.push(directory);
        }
    }
    Ok(directories)
}
