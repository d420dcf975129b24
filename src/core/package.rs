//! Package model
//!
//! A [`Package`] is identified by its directory relative to the repository
//! root. A [`PackageInfo`] adds the package name and the dependencies that
//! resolve to other packages of the same repository. Dependencies on names
//! that are not part of the repository (registry packages) are dropped while
//! resolving, so every dependency edge in a [`PackageInfos`] map points at a
//! key of that same map.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::DiscoveryError;

/// Milliseconds since the Unix epoch
pub type Timestamp = i64;

/// Timestamp of an instant given in whole seconds, as git reports commit times
pub fn timestamp_from_secs(seconds: i64) -> Timestamp {
    seconds.saturating_mul(1000)
}

/// The current wall-clock time
pub fn current_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| Timestamp::try_from(d.as_millis()).unwrap_or(Timestamp::MAX))
}

/// Directory key used for a package living at the repository root
pub const ROOT_DIRECTORY: &str = ".";

/// A buildable unit, identified by its root-relative directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Package {
    /// Root-relative directory using `/` separators
    pub directory: String,
}

impl Package {
    /// Create a package from a root-relative directory
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Whether a root-relative file path lies inside this package
    pub fn contains_file(&self, file: &str) -> bool {
        if self.directory == ROOT_DIRECTORY {
            return true;
        }
        file.strip_prefix(self.directory.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directory)
    }
}

/// A package with its name and resolved internal dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    /// Package identity
    #[serde(flatten)]
    pub package: Package,
    /// Logical package name (from package.json)
    pub name: String,
    /// Dependencies resolved to other packages of the repository
    pub dependencies: Vec<Package>,
}

impl PackageInfo {
    /// Create a package info
    pub fn new(directory: impl Into<String>, name: impl Into<String>, dependencies: Vec<Package>) -> Self {
        Self {
            package: Package::new(directory),
            name: name.into(),
            dependencies,
        }
    }

    /// Root-relative directory of the package
    pub fn directory(&self) -> &str {
        &self.package.directory
    }
}

/// Package infos keyed by directory
///
/// Ordered so that every traversal over packages is deterministic.
pub type PackageInfos = BTreeMap<String, PackageInfo>;

/// A package info together with the time of its last valid build
///
/// `None` means the package must be rebuilt whatever its dependencies say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfoWithBuildTime {
    /// The package info
    pub info: PackageInfo,
    /// Time of the last successful build that still matches the sources
    pub last_build_time: Option<Timestamp>,
}

/// Package infos with build times keyed by directory
pub type PackageInfosWithBuildTime = BTreeMap<String, PackageInfoWithBuildTime>;

/// A discovered package whose dependencies are still names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPackage {
    /// Package identity
    pub package: Package,
    /// Logical package name
    pub name: String,
    /// Names of every declared dependency, internal or external
    pub dependency_names: Vec<String>,
}

/// Resolve dependency names to packages of the same repository
///
/// Names that do not belong to any discovered package are dropped. Duplicate
/// dependency names are collapsed, keeping the first occurrence.
pub fn resolve_package_infos(packages: Vec<UnresolvedPackage>) -> Result<PackageInfos, DiscoveryError> {
    let mut by_name: HashMap<String, String> = HashMap::new();
    for pkg in &packages {
        if let Some(first) = by_name.insert(pkg.name.clone(), pkg.package.directory.clone()) {
            return Err(DiscoveryError::DuplicateName {
                name: pkg.name.clone(),
                first,
                second: pkg.package.directory.clone(),
            });
        }
    }

    let mut infos = PackageInfos::new();
    for pkg in packages {
        let mut dependencies: Vec<Package> = Vec::new();
        for dep_name in &pkg.dependency_names {
            let Some(directory) = by_name.get(dep_name) else {
                tracing::trace!("{}: dropping external dependency {dep_name}", pkg.name);
                continue;
            };
            if !dependencies.iter().any(|d| &d.directory == directory) {
                dependencies.push(Package::new(directory.clone()));
            }
        }
        infos.insert(
            pkg.package.directory.clone(),
            PackageInfo {
                package: pkg.package,
                name: pkg.name,
                dependencies,
            },
        );
    }

    Ok(infos)
}

/// Turn a path relative to the repository root into a package directory key
///
/// Uses `/` separators on every platform; the root itself becomes `"."`.
pub fn normalize_directory(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        ROOT_DIRECTORY.to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unresolved(dir: &str, name: &str, deps: &[&str]) -> UnresolvedPackage {
        UnresolvedPackage {
            package: Package::new(dir),
            name: name.to_string(),
            dependency_names: deps.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_contains_file_matches_directory_prefix() {
        let pkg = Package::new("packages/a");
        assert!(pkg.contains_file("packages/a/index.js"));
        assert!(pkg.contains_file("packages/a/src/lib.js"));
        assert!(!pkg.contains_file("packages/ab/index.js"));
        assert!(!pkg.contains_file("packages/a"));
        assert!(!pkg.contains_file("other/packages/a/index.js"));
    }

    #[test]
    fn test_root_package_contains_everything() {
        let pkg = Package::new(ROOT_DIRECTORY);
        assert!(pkg.contains_file("README.md"));
        assert!(pkg.contains_file("packages/a/index.js"));
    }

    #[test]
    fn test_resolve_drops_external_dependencies() {
        let infos = resolve_package_infos(vec![
            unresolved("packages/a", "@scope/a", &["@scope/b", "lodash"]),
            unresolved("packages/b", "@scope/b", &["react"]),
        ])
        .unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos["packages/a"].dependencies, vec![Package::new("packages/b")]);
        assert!(infos["packages/b"].dependencies.is_empty());
    }

    #[test]
    fn test_resolve_collapses_duplicate_dependencies() {
        let infos = resolve_package_infos(vec![
            unresolved("a", "a", &["b", "b"]),
            unresolved("b", "b", &[]),
        ])
        .unwrap();
        assert_eq!(infos["a"].dependencies.len(), 1);
    }

    #[test]
    fn test_resolve_rejects_duplicate_names() {
        let result = resolve_package_infos(vec![
            unresolved("one", "same", &[]),
            unresolved("two", "same", &[]),
        ]);
        assert!(matches!(result, Err(DiscoveryError::DuplicateName { .. })));
    }

    #[test]
    fn test_every_dependency_is_a_key() {
        let infos = resolve_package_infos(vec![
            unresolved("a", "a", &["b", "c", "x"]),
            unresolved("b", "b", &["c", "y"]),
            unresolved("c", "c", &["z"]),
        ])
        .unwrap();

        for info in infos.values() {
            for dep in &info.dependencies {
                assert!(infos.contains_key(&dep.directory));
            }
        }
    }

    #[test]
    fn test_normalize_directory() {
        assert_eq!(normalize_directory(&PathBuf::from("")), ".");
        assert_eq!(normalize_directory(&PathBuf::from("packages/a")), "packages/a");
        assert_eq!(normalize_directory(&PathBuf::from("./packages/a/")), "packages/a");
    }
}
