//! Change detection
//!
//! Finds, for each package, the most recent commit that touched a file under
//! its directory. Uncommitted working tree changes count as a commit that is
//! newer than anything in the history; it carries the reserved id
//! [`UNCOMMITTED_COMMIT_ID`].

use std::collections::BTreeMap;

use crate::core::package::{Package, Timestamp};

/// Commit id standing for the uncommitted working tree changes
pub const UNCOMMITTED_COMMIT_ID: &str = "";

/// A commit from the repository history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full commit id
    pub id: String,
    /// Commit time
    pub time: Timestamp,
    /// Root-relative paths of the files it changed
    pub files: Vec<String>,
}

/// The latest change to a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageChange {
    /// Commit id, or [`UNCOMMITTED_COMMIT_ID`]
    pub commit_id: String,
    /// Time of the commit (current time for uncommitted changes)
    pub time: Timestamp,
}

impl PackageChange {
    /// Whether the change is not committed yet
    pub fn is_uncommitted(&self) -> bool {
        self.commit_id == UNCOMMITTED_COMMIT_ID
    }
}

/// The changes that decide whether a package's last build is still valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageChanges {
    /// Most recent change, uncommitted changes included
    pub latest: PackageChange,
    /// Most recent commit touching the package within the scanned history
    ///
    /// Equal to `latest` unless the package has uncommitted changes.
    pub latest_commit: Option<PackageChange>,
}

/// Find the most recent change of every package
///
/// `history` must be ordered newest first. Packages whose files were not
/// touched by the uncommitted changes nor by any commit of `history` are
/// absent from the result. A package with uncommitted changes also gets the
/// latest commit that touched it, so a build made with those changes can
/// still be checked against the history.
pub fn find_latest_package_changes(
    packages: &[Package],
    uncommitted_files: &[String],
    history: &[Commit],
    now: Timestamp,
) -> BTreeMap<String, PackageChanges> {
    let mut changes: BTreeMap<String, PackageChanges> = BTreeMap::new();

    for package in packages {
        if uncommitted_files.iter().any(|f| package.contains_file(f)) {
            changes.insert(
                package.directory.clone(),
                PackageChanges {
                    latest: PackageChange {
                        commit_id: UNCOMMITTED_COMMIT_ID.to_string(),
                        time: now,
                    },
                    latest_commit: None,
                },
            );
        }
    }

    let mut pending: Vec<&Package> = packages.iter().collect();
    for commit in history {
        if pending.is_empty() {
            break;
        }
        pending.retain(|package| {
            if !commit.files.iter().any(|f| package.contains_file(f)) {
                return true;
            }
            let change = PackageChange {
                commit_id: commit.id.clone(),
                time: commit.time,
            };
            changes
                .entry(package.directory.clone())
                .and_modify(|c| c.latest_commit = Some(change.clone()))
                .or_insert_with(|| PackageChanges {
                    latest: change.clone(),
                    latest_commit: Some(change),
                });
            false
        });
    }

    changes
}

/// Files under a package among a list of changed files
pub fn find_changed_files<'a>(package: &Package, files: &'a [String]) -> Vec<&'a str> {
    files
        .iter()
        .filter(|f| package.contains_file(f))
        .map(String::as_str)
        .collect()
}
