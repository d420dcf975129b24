//! Build times from markers and change history
//!
//! A package keeps the time of its last build only while its sources still
//! match what was built; otherwise it gets no time and is dirty on its own.

use std::collections::BTreeMap;

use crate::core::changes::PackageChanges;
use crate::core::marker::LastBuildMarker;
use crate::core::package::{PackageInfoWithBuildTime, PackageInfos, PackageInfosWithBuildTime, Timestamp};

/// Hashes of a package's uncommitted files, keyed by root-relative path
pub type WorkspaceHashes = BTreeMap<String, String>;

/// Time of the last build that is still valid for a package
///
/// * never built: `None`
/// * uncommitted changes: valid only if the marker recorded the same files
///   with the same hashes
/// * built with uncommitted changes that are gone now: `None`
/// * a commit touched the package: valid only if the package was built at
///   that commit or at a later one, whether or not it also has uncommitted
///   changes
/// * no commit found in the scanned history: valid
pub fn last_build_time(
    marker: Option<&LastBuildMarker>,
    changes: Option<&PackageChanges>,
    workspace: &WorkspaceHashes,
) -> Option<Timestamp> {
    let marker = marker?;
    let recorded = marker.workspace_hashes();

    if !workspace.is_empty() || changes.is_some_and(|c| c.latest.is_uncommitted()) {
        if recorded != *workspace {
            return None;
        }
    } else if !recorded.is_empty() {
        return None;
    }

    match changes.and_then(|c| c.latest_commit.as_ref()) {
        Some(commit) if marker.commit.as_deref() == Some(commit.commit_id.as_str()) => Some(marker.build_time),
        Some(commit) if commit.time > marker.commit_time => None,
        _ => Some(marker.build_time),
    }
}

/// Attach build times to every package
pub fn calculate_build_times(
    package_infos: &PackageInfos,
    markers: &BTreeMap<String, LastBuildMarker>,
    changes: &BTreeMap<String, PackageChanges>,
    workspace: &BTreeMap<String, WorkspaceHashes>,
) -> PackageInfosWithBuildTime {
    let empty = WorkspaceHashes::new();
    package_infos
        .iter()
        .map(|(dir, info)| {
            let time = last_build_time(
                markers.get(dir),
                changes.get(dir),
                workspace.get(dir).unwrap_or(&empty),
            );
            if time.is_none() {
                tracing::debug!("{dir} changed since its last build");
            }
            (
                dir.clone(),
                PackageInfoWithBuildTime {
                    info: info.clone(),
                    last_build_time: time,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::changes::{find_latest_package_changes, Commit, PackageChange, UNCOMMITTED_COMMIT_ID};
    use crate::core::package::Package;
    use crate::core::packages_to_build::calculate_packages_to_build;
    use crate::test_utils::fixtures::package_infos;

    /// Marker of a build at `commit` that finished when the commit was made
    fn marker(commit: &str, time: Timestamp) -> LastBuildMarker {
        LastBuildMarker {
            commit: Some(commit.to_string()),
            commit_time: time,
            build_time: time,
            changed_files_in_workspace: None,
        }
    }

    /// A committed change
    fn change(commit: &str, time: Timestamp) -> PackageChanges {
        let change = PackageChange {
            commit_id: commit.to_string(),
            time,
        };
        PackageChanges {
            latest: change.clone(),
            latest_commit: Some(change),
        }
    }

    /// Uncommitted changes on top of an optional latest commit
    fn uncommitted(latest_commit: Option<(&str, Timestamp)>) -> PackageChanges {
        PackageChanges {
            latest: PackageChange {
                commit_id: UNCOMMITTED_COMMIT_ID.to_string(),
                time: 999,
            },
            latest_commit: latest_commit.map(|(id, time)| PackageChange {
                commit_id: id.to_string(),
                time,
            }),
        }
    }

    fn hashes(pairs: &[(&str, &str)]) -> WorkspaceHashes {
        pairs.iter().map(|(p, h)| ((*p).to_string(), (*h).to_string())).collect()
    }

    #[test]
    fn test_never_built_is_dirty() {
        assert_eq!(last_build_time(None, None, &WorkspaceHashes::new()), None);
        assert_eq!(
            last_build_time(None, Some(&change("c1", 10)), &WorkspaceHashes::new()),
            None
        );
    }

    #[test]
    fn test_built_at_latest_change_is_clean() {
        let m = marker("c2", 200);
        assert_eq!(last_build_time(Some(&m), Some(&change("c2", 200)), &WorkspaceHashes::new()), Some(200));
    }

    #[test]
    fn test_built_after_latest_change_is_clean() {
        let m = marker("c5", 500);
        assert_eq!(last_build_time(Some(&m), Some(&change("c2", 200)), &WorkspaceHashes::new()), Some(500));
    }

    #[test]
    fn test_changed_after_build_is_dirty() {
        let m = marker("c2", 200);
        assert_eq!(last_build_time(Some(&m), Some(&change("c3", 300)), &WorkspaceHashes::new()), None);
    }

    #[test]
    fn test_no_change_in_history_keeps_build_time() {
        let m = marker("c2", 200);
        assert_eq!(last_build_time(Some(&m), None, &WorkspaceHashes::new()), Some(200));
    }

    #[test]
    fn test_uncommitted_changes_without_recorded_hashes_are_dirty() {
        let m = marker("c2", 200);
        let ws = hashes(&[("a/index.js", "h1")]);
        assert_eq!(last_build_time(Some(&m), Some(&uncommitted(Some(("c2", 200)))), &ws), None);
    }

    #[test]
    fn test_uncommitted_changes_matching_marker_are_clean() {
        let mut m = marker("c2", 200);
        m.changed_files_in_workspace = Some(hashes(&[("a/index.js", "h1")]));
        let changes = uncommitted(Some(("c2", 200)));

        assert_eq!(
            last_build_time(Some(&m), Some(&changes), &hashes(&[("a/index.js", "h1")])),
            Some(200)
        );
        assert_eq!(
            last_build_time(Some(&m), Some(&changes), &hashes(&[("a/index.js", "h2")])),
            None
        );
    }

    #[test]
    fn test_commit_after_build_with_uncommitted_changes_is_dirty() {
        let mut m = marker("c1", 100);
        m.changed_files_in_workspace = Some(hashes(&[("a/x.js", "h")]));
        let ws = hashes(&[("a/x.js", "h")]);

        assert_eq!(last_build_time(Some(&m), Some(&uncommitted(Some(("c2", 200)))), &ws), None);
        assert_eq!(last_build_time(Some(&m), Some(&uncommitted(Some(("c1", 100)))), &ws), Some(100));
        assert_eq!(last_build_time(Some(&m), Some(&uncommitted(None)), &ws), Some(100));
    }

    #[test]
    fn test_commit_after_build_with_uncommitted_changes_from_history() {
        let infos = package_infos(&[("a", &[])]);
        let mut m = marker("c1", 100);
        m.changed_files_in_workspace = Some(hashes(&[("a/x.js", "h")]));
        let history = vec![
            Commit {
                id: "c2".to_string(),
                time: 200,
                files: vec!["a/y.js".to_string()],
            },
            Commit {
                id: "c1".to_string(),
                time: 100,
                files: vec!["a/x.js".to_string()],
            },
        ];
        let changes = find_latest_package_changes(&[Package::new("a")], &["a/x.js".to_string()], &history, 999);
        let workspace = BTreeMap::from([("a".to_string(), hashes(&[("a/x.js", "h")]))]);

        let timed = calculate_build_times(&infos, &BTreeMap::from([("a".to_string(), m)]), &changes, &workspace);

        assert_eq!(timed["a"].last_build_time, None);
    }

    #[test]
    fn test_dependency_rebuilt_after_dependent_makes_it_dirty() {
        let infos = package_infos(&[("app", &["lib"]), ("lib", &[])]);
        let mut lib = marker("c1", 100);
        lib.build_time = 300;
        lib.changed_files_in_workspace = Some(hashes(&[("lib/x.js", "h")]));
        let mut app = marker("c1", 100);
        app.build_time = 200;
        let markers = BTreeMap::from([("app".to_string(), app), ("lib".to_string(), lib)]);
        let changes = BTreeMap::from([
            ("app".to_string(), change("c1", 100)),
            ("lib".to_string(), uncommitted(Some(("c1", 100)))),
        ]);
        let workspace = BTreeMap::from([("lib".to_string(), hashes(&[("lib/x.js", "h")]))]);

        let timed = calculate_build_times(&infos, &markers, &changes, &workspace);
        assert_eq!(timed["app"].last_build_time, Some(200));
        assert_eq!(timed["lib"].last_build_time, Some(300));

        let all = vec!["app".to_string(), "lib".to_string()];
        let to_build = calculate_packages_to_build(&timed, &all, &all, false);
        assert_eq!(to_build.package_infos.keys().collect::<Vec<_>>(), vec!["app"]);
    }

    #[test]
    fn test_recorded_workspace_changes_that_vanished_are_dirty() {
        let mut m = marker("c2", 200);
        m.changed_files_in_workspace = Some(hashes(&[("a/index.js", "h1")]));
        assert_eq!(last_build_time(Some(&m), Some(&change("c2", 200)), &WorkspaceHashes::new()), None);
    }

    #[test]
    fn test_calculate_build_times() {
        let infos = package_infos(&[("a", &["b"]), ("b", &[]), ("c", &[])]);
        let markers = BTreeMap::from([
            ("a".to_string(), marker("c1", 100)),
            ("b".to_string(), marker("c1", 100)),
        ]);
        let changes = BTreeMap::from([("b".to_string(), change("c2", 150))]);

        let timed = calculate_build_times(&infos, &markers, &changes, &BTreeMap::new());

        assert_eq!(timed["a"].last_build_time, Some(100));
        assert_eq!(timed["b"].last_build_time, None);
        assert_eq!(timed["c"].last_build_time, None);
    }
}
