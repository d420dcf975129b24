//! Test utilities for unit and property-based tests
//!
//! Fixtures build small package graphs where a package's name equals its
//! directory; generators produce random graphs for proptest.

#[cfg(test)]
pub mod fixtures {
    use crate::core::package::{
        Package, PackageInfo, PackageInfoWithBuildTime, PackageInfos, PackageInfosWithBuildTime, Timestamp,
    };

    /// Build package infos from `(directory, dependencies)` pairs
    pub fn package_infos(specs: &[(&str, &[&str])]) -> PackageInfos {
        specs
            .iter()
            .map(|(dir, deps)| {
                (
                    (*dir).to_string(),
                    PackageInfo::new(*dir, *dir, deps.iter().map(|d| Package::new(*d)).collect()),
                )
            })
            .collect()
    }

    /// Attach build times; packages not listed get `None`
    pub fn with_build_times(
        infos: &PackageInfos,
        times: &[(&str, Option<Timestamp>)],
    ) -> PackageInfosWithBuildTime {
        infos
            .iter()
            .map(|(dir, info)| {
                let last_build_time = times
                    .iter()
                    .find(|(d, _)| d == dir)
                    .and_then(|(_, t)| *t);
                (
                    dir.clone(),
                    PackageInfoWithBuildTime {
                        info: info.clone(),
                        last_build_time,
                    },
                )
            })
            .collect()
    }

    /// Every package without a build time
    pub fn all_dirty(infos: &PackageInfos) -> PackageInfosWithBuildTime {
        with_build_times(infos, &[])
    }
}

#[cfg(test)]
pub mod generators {
    use crate::core::package::{Package, PackageInfo, PackageInfos};
    use proptest::prelude::*;

    fn graph_from_matrix(n: usize, edges: &[bool], acyclic: bool) -> PackageInfos {
        (0..n)
            .map(|i| {
                let deps = (0..n)
                    .filter(|&j| edges[i * n + j] && (!acyclic || j < i))
                    .map(|j| Package::new(format!("p{j}")))
                    .collect();
                (format!("p{i}"), PackageInfo::new(format!("p{i}"), format!("p{i}"), deps))
            })
            .collect()
    }

    fn matrix(max_packages: usize) -> impl Strategy<Value = (usize, Vec<bool>)> {
        assert!(max_packages < 10, "single digit names keep directory order numeric");
        (1..=max_packages).prop_flat_map(|n| {
            (
                Just(n),
                proptest::collection::vec(proptest::bool::weighted(0.3), n * n),
            )
        })
    }

    /// Random acyclic package graph with up to `max_packages` packages
    pub fn dag(max_packages: usize) -> impl Strategy<Value = PackageInfos> {
        matrix(max_packages).prop_map(|(n, edges)| graph_from_matrix(n, &edges, true))
    }

    /// Random package graph that may contain cycles and self dependencies
    pub fn any_graph(max_packages: usize) -> impl Strategy<Value = PackageInfos> {
        matrix(max_packages).prop_map(|(n, edges)| graph_from_matrix(n, &edges, false))
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_dag_generator_only_points_backwards(infos in dag(8)) {
            for (dir, info) in &infos {
                for dep in &info.dependencies {
                    prop_assert!(dep.directory < *dir);
                }
            }
        }

        #[test]
        fn test_any_graph_dependencies_are_keys(infos in any_graph(8)) {
            for info in infos.values() {
                for dep in &info.dependencies {
                    prop_assert!(infos.contains_key(&dep.directory));
                }
            }
        }
    }
}
