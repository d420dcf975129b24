//! Selection of the packages an invocation has to build
//!
//! Narrows the repository graph to the packages linking the requested base
//! packages to the `upto` packages, then keeps those that are dirty.

use crate::core::graph::{self, DependencyGraph, GraphWarning, SnippedEdge};
use crate::core::package::{PackageInfo, PackageInfos, PackageInfosWithBuildTime};

/// Packages selected for building
#[derive(Debug, Clone, Default)]
pub struct PackagesToBuild {
    /// Dirty packages, with cycle-breaking edges removed from their dependencies
    pub package_infos: PackageInfos,
    /// Edges removed to break dependency cycles
    pub snipped: Vec<SnippedEdge>,
    /// Non-fatal conditions the caller may report
    pub warnings: Vec<GraphWarning>,
}

/// Calculate which packages need building
///
/// `base_packages` and `upto_packages` are package directories. Dirtiness is
/// propagated over every declared dependency, including those snipped to
/// break cycles; snipped edges only disappear from the returned dependency
/// lists so that the result can be scheduled.
pub fn calculate_packages_to_build(
    package_infos: &PackageInfosWithBuildTime,
    base_packages: &[String],
    upto_packages: &[String],
    force: bool,
) -> PackagesToBuild {
    let plain: PackageInfos = package_infos
        .iter()
        .map(|(dir, p)| (dir.clone(), p.info.clone()))
        .collect();

    let (_, snipped) = graph::build_graph(&plain);

    let mut linked = DependencyGraph::from_package_infos(&plain);
    let mut warnings = Vec::new();
    if let Some(warning) = graph::build_linked_subset(&mut linked, base_packages, upto_packages) {
        warnings.push(warning);
    }

    let dirty = graph::propagate_dirty(&linked, package_infos, force);
    tracing::debug!(
        "{} of {} linked packages are dirty",
        dirty.len(),
        linked.package_count()
    );

    let package_infos = plain
        .into_iter()
        .filter(|(dir, _)| dirty.contains(dir))
        .map(|(dir, info)| {
            let info = without_snipped_edges(info, &snipped);
            (dir, info)
        })
        .collect();

    PackagesToBuild {
        package_infos,
        snipped,
        warnings,
    }
}

fn without_snipped_edges(mut info: PackageInfo, snipped: &[SnippedEdge]) -> PackageInfo {
    let from = info.package.directory.clone();
    info.dependencies
        .retain(|dep| !snipped.iter().any(|e| e.from == from && e.to == dep.directory));
    info
}
