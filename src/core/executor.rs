//! Build execution
//!
//! Walks a [`BuildOrder`] depth first and builds one package at a time. A
//! package is attempted only once every dependency it has among the packages
//! being built has succeeded. When a package fails, everything downstream of
//! it is reported as not built and never attempted; unrelated packages carry
//! on.

use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::core::build_order::BuildOrder;
use crate::core::package::{Package, PackageInfo, PackageInfos};
use crate::error::ExecutorError;

/// What a package build callback reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The package built
    Success,
    /// The package did not build
    Failure,
}

/// Final state of a package in one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildResult {
    /// Built successfully
    Success,
    /// Attempted and failed
    Failure,
    /// Not attempted because a dependency failed
    NotBuilt,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::NotBuilt => write!(f, "not-built"),
        }
    }
}

/// Result of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPackageResult {
    /// The package
    pub package: Package,
    /// Its final state
    pub build_result: BuildResult,
    /// Error reported by the build callback, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildPackageResult {
    fn new(package: Package, build_result: BuildResult, error: Option<String>) -> Self {
        Self {
            package,
            build_result,
            error,
        }
    }
}

/// Builds a single package
pub trait PackageBuilder {
    /// Build one package; an `Err` counts as a failure with that error
    fn build_package<'a>(
        &'a mut self,
        package_info: &'a PackageInfo,
    ) -> BoxFuture<'a, anyhow::Result<BuildOutcome>>;
}

/// Receives build progress as it happens
pub trait BuildObserver {
    /// A package is about to be attempted
    fn package_started(&self, _package_info: &PackageInfo) {}

    /// A package reached its final state
    fn package_finished(&self, _result: &BuildPackageResult) {}
}

/// Observer that reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BuildObserver for TracingObserver {
    fn package_started(&self, package_info: &PackageInfo) {
        tracing::info!("Building {} ({})", package_info.name, package_info.directory());
    }

    fn package_finished(&self, result: &BuildPackageResult) {
        match (&result.build_result, &result.error) {
            (BuildResult::Failure, Some(error)) => {
                tracing::warn!("{}: failure: {error}", result.package);
            }
            (build_result, _) => tracing::info!("{}: {build_result}", result.package),
        }
    }
}

/// Build every package of `build_order`
///
/// Returns exactly one result per package of `package_infos`, in the order
/// they were decided; the observer sees each result as soon as it is known.
/// Fails before building anything if the order names a package that is not
/// in `package_infos`.
pub async fn build<B, O>(
    package_infos: &PackageInfos,
    build_order: &BuildOrder,
    builder: &mut B,
    observer: &O,
) -> Result<Vec<BuildPackageResult>, ExecutorError>
where
    B: PackageBuilder + ?Sized,
    O: BuildObserver + ?Sized,
{
    if let Some(node) = build_order
        .nodes()
        .iter()
        .find(|n| !package_infos.contains_key(&n.package.directory))
    {
        return Err(ExecutorError::MissingPackageInfo {
            directory: node.package.directory.clone(),
        });
    }

    let mut already_built: HashSet<&str> = HashSet::new();
    let mut failed: HashSet<&str> = HashSet::new();
    let mut cannot_build: BTreeSet<&str> = BTreeSet::new();
    let mut results: Vec<BuildPackageResult> = Vec::with_capacity(package_infos.len());

    let mut stack: Vec<usize> = build_order.roots().iter().rev().copied().collect();

    while let Some(index) = stack.pop() {
        let node = build_order.node(index);
        let directory = node.package.directory.as_str();

        if already_built.contains(directory) || failed.contains(directory) || cannot_build.contains(directory) {
            continue;
        }

        let package_info = &package_infos[directory];
        let ready = package_info
            .dependencies
            .iter()
            .filter(|dep| package_infos.contains_key(&dep.directory))
            .all(|dep| already_built.contains(dep.directory.as_str()));
        if !ready {
            // reached again from the dependency that is still missing
            continue;
        }

        observer.package_started(package_info);
        let result = match builder.build_package(package_info).await {
            Ok(BuildOutcome::Success) => {
                already_built.insert(directory);
                stack.extend(node.build_order_after.iter().rev());
                BuildPackageResult::new(node.package.clone(), BuildResult::Success, None)
            }
            Ok(BuildOutcome::Failure) => {
                failed.insert(directory);
                mark_downstream(build_order, index, &mut cannot_build);
                BuildPackageResult::new(node.package.clone(), BuildResult::Failure, None)
            }
            Err(error) => {
                failed.insert(directory);
                mark_downstream(build_order, index, &mut cannot_build);
                BuildPackageResult::new(node.package.clone(), BuildResult::Failure, Some(format!("{error:#}")))
            }
        };
        observer.package_finished(&result);
        results.push(result);
    }

    let decided: HashSet<String> = results.iter().map(|r| r.package.directory.clone()).collect();
    let leftovers = cannot_build
        .iter()
        .map(|d| (*d).to_string())
        .chain(package_infos.keys().cloned())
        .filter(|d| !decided.contains(d))
        .collect::<BTreeSet<String>>();

    for directory in leftovers {
        let result = BuildPackageResult::new(Package::new(directory), BuildResult::NotBuilt, None);
        observer.package_finished(&result);
        results.push(result);
    }

    Ok(results)
}

fn mark_downstream<'a>(build_order: &'a BuildOrder, failed_index: usize, cannot_build: &mut BTreeSet<&'a str>) {
    let mut pending: Vec<usize> = build_order.node(failed_index).build_order_after.clone();
    while let Some(index) = pending.pop() {
        let node = build_order.node(index);
        if cannot_build.insert(node.package.directory.as_str()) {
            pending.extend(&node.build_order_after);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::build_order::calculate_build_order;
    use crate::test_utils::fixtures::package_infos;
    use crate::test_utils::generators::dag;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records build attempts; fails or errors on request
    #[derive(Default)]
    struct RecordingBuilder {
        attempts: Vec<String>,
        fail: HashSet<String>,
        error: HashSet<String>,
    }

    impl RecordingBuilder {
        fn failing(names: &[&str]) -> Self {
            Self {
                fail: names.iter().map(ToString::to_string).collect(),
                ..Self::default()
            }
        }
    }

    impl PackageBuilder for RecordingBuilder {
        fn build_package<'a>(
            &'a mut self,
            package_info: &'a PackageInfo,
        ) -> BoxFuture<'a, anyhow::Result<BuildOutcome>> {
            Box::pin(async move {
                let dir = package_info.directory().to_string();
                self.attempts.push(dir.clone());
                if self.error.contains(&dir) {
                    anyhow::bail!("exploded while building {dir}");
                }
                if self.fail.contains(&dir) {
                    return Ok(BuildOutcome::Failure);
                }
                Ok(BuildOutcome::Success)
            })
        }
    }

    #[derive(Default)]
    struct CollectingObserver {
        started: Mutex<Vec<String>>,
        finished: Mutex<Vec<BuildPackageResult>>,
    }

    impl BuildObserver for CollectingObserver {
        fn package_started(&self, package_info: &PackageInfo) {
            self.started.lock().unwrap().push(package_info.directory().to_string());
        }

        fn package_finished(&self, result: &BuildPackageResult) {
            self.finished.lock().unwrap().push(result.clone());
        }
    }

    fn by_dir(results: &[BuildPackageResult]) -> HashMap<String, BuildResult> {
        results
            .iter()
            .map(|r| (r.package.directory.clone(), r.build_result))
            .collect()
    }

    fn scenario_a() -> PackageInfos {
        package_infos(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["e"]),
            ("d", &["e"]),
            ("e", &[]),
            ("f", &[]),
        ])
    }

    #[tokio::test]
    async fn test_scenario_a_build_order() {
        let infos = scenario_a();
        let order = calculate_build_order(&infos);
        let mut builder = RecordingBuilder::default();

        let results = build(&infos, &order, &mut builder, &TracingObserver).await.unwrap();

        assert_eq!(builder.attempts, vec!["e", "c", "d", "b", "a", "f"]);
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.build_result == BuildResult::Success));
    }

    #[tokio::test]
    async fn test_scenario_b_failure_marks_downstream_not_built() {
        let infos = package_infos(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["e"]),
            ("d", &["c", "e"]),
            ("e", &[]),
            ("f", &[]),
        ]);
        let order = calculate_build_order(&infos);
        let mut builder = RecordingBuilder::failing(&["c"]);

        let results = build(&infos, &order, &mut builder, &TracingObserver).await.unwrap();
        let states = by_dir(&results);

        assert_eq!(states["e"], BuildResult::Success);
        assert_eq!(states["c"], BuildResult::Failure);
        assert_eq!(states["d"], BuildResult::NotBuilt);
        assert_eq!(states["b"], BuildResult::NotBuilt);
        assert_eq!(states["a"], BuildResult::NotBuilt);
        assert_eq!(states["f"], BuildResult::Success);
        assert_eq!(builder.attempts, vec!["e", "c", "f"]);
        assert_eq!(results.len(), 6);
    }

    #[tokio::test]
    async fn test_callback_error_is_captured() {
        let infos = package_infos(&[("a", &["b"]), ("b", &[])]);
        let order = calculate_build_order(&infos);
        let mut builder = RecordingBuilder {
            error: HashSet::from(["b".to_string()]),
            ..RecordingBuilder::default()
        };

        let results = build(&infos, &order, &mut builder, &TracingObserver).await.unwrap();

        assert_eq!(results[0].build_result, BuildResult::Failure);
        assert!(results[0].error.as_deref().unwrap().contains("exploded while building b"));
        assert_eq!(results[1].package.directory, "a");
        assert_eq!(results[1].build_result, BuildResult::NotBuilt);
        assert!(results[1].error.is_none());
    }

    #[tokio::test]
    async fn test_observer_sees_every_result() {
        let infos = scenario_a();
        let order = calculate_build_order(&infos);
        let mut builder = RecordingBuilder::failing(&["d"]);
        let observer = CollectingObserver::default();

        let results = build(&infos, &order, &mut builder, &observer).await.unwrap();

        assert_eq!(*observer.started.lock().unwrap(), builder.attempts);
        assert_eq!(*observer.finished.lock().unwrap(), results);
    }

    #[tokio::test]
    async fn test_missing_package_info_fails_before_building() {
        let order = calculate_build_order(&scenario_a());
        let partial = package_infos(&[("e", &[]), ("f", &[])]);
        let mut builder = RecordingBuilder::default();

        let result = build(&partial, &order, &mut builder, &TracingObserver).await;

        assert!(matches!(result, Err(ExecutorError::MissingPackageInfo { .. })));
        assert!(builder.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_empty_build() {
        let infos = PackageInfos::new();
        let order = calculate_build_order(&infos);
        let results = build(&infos, &order, &mut RecordingBuilder::default(), &TracingObserver)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    // ============================================
    // Property-Based Tests
    // ============================================

    /// Expected state when the packages in `fail` fail: a package is attempted
    /// only when every transitive dependency succeeded
    fn expected_state(
        infos: &PackageInfos,
        dir: &str,
        fail: &HashSet<String>,
        memo: &mut HashMap<String, BuildResult>,
    ) -> BuildResult {
        if let Some(state) = memo.get(dir) {
            return *state;
        }
        let deps_ok = infos[dir]
            .dependencies
            .iter()
            .all(|d| expected_state(infos, &d.directory, fail, memo) == BuildResult::Success);
        let state = if !deps_ok {
            BuildResult::NotBuilt
        } else if fail.contains(dir) {
            BuildResult::Failure
        } else {
            BuildResult::Success
        };
        memo.insert(dir.to_string(), state);
        state
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// No package is attempted before all of its dependencies succeeded
        #[test]
        fn prop_dependency_order(infos in dag(8), fail_mask in proptest::collection::vec(proptest::bool::weighted(0.2), 8)) {
            let fail: Vec<&str> = infos.keys().zip(&fail_mask).filter(|(_, f)| **f).map(|(d, _)| d.as_str()).collect();
            let order = calculate_build_order(&infos);
            let mut builder = RecordingBuilder::failing(&fail);

            futures::executor::block_on(build(&infos, &order, &mut builder, &TracingObserver)).unwrap();

            for (position, dir) in builder.attempts.iter().enumerate() {
                for dep in &infos[dir].dependencies {
                    let dep_position = builder.attempts.iter().position(|a| *a == dep.directory);
                    prop_assert!(dep_position.is_some_and(|p| p < position), "{} before {}", dep.directory, dir);
                    prop_assert!(!fail.contains(&dep.directory.as_str()));
                }
            }
        }

        /// Failures affect exactly their downstream, and every package gets one result
        #[test]
        fn prop_failure_containment(infos in dag(8), fail_mask in proptest::collection::vec(proptest::bool::weighted(0.2), 8)) {
            let fail: HashSet<String> = infos.keys().zip(&fail_mask).filter(|(_, f)| **f).map(|(d, _)| d.clone()).collect();
            let order = calculate_build_order(&infos);
            let mut builder = RecordingBuilder { fail: fail.clone(), ..RecordingBuilder::default() };

            let results = futures::executor::block_on(build(&infos, &order, &mut builder, &TracingObserver)).unwrap();
            prop_assert_eq!(results.len(), infos.len());

            let states = by_dir(&results);
            prop_assert_eq!(states.len(), infos.len());

            let mut memo = HashMap::new();
            for dir in infos.keys() {
                prop_assert_eq!(states[dir], expected_state(&infos, dir, &fail, &mut memo), "package {}", dir);
            }

            let attempted: HashSet<&String> = builder.attempts.iter().collect();
            prop_assert_eq!(attempted.len(), builder.attempts.len(), "a package was attempted twice");
        }
    }
}
