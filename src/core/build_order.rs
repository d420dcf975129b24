//! Build order calculation
//!
//! The build order is a forest. Its roots are the packages with no
//! dependency among the packages being built; below every node hang the
//! packages that directly depend on it. Nodes live in an arena, so a package
//! depended upon by several others is one node referenced from each of its
//! dependencies' child lists.

use std::collections::{BTreeMap, HashMap};

use crate::core::package::{Package, PackageInfos};

/// One package in the build order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    /// The package to build
    pub package: Package,
    /// Arena indices of the packages to consider once this one is built
    pub build_order_after: Vec<usize>,
}

/// Dependency-first build forest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOrder {
    nodes: Vec<BuildNode>,
    roots: Vec<usize>,
    indices: HashMap<String, usize>,
}

impl BuildOrder {
    /// Arena indices of the root nodes
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node at an arena index
    pub fn node(&self, index: usize) -> &BuildNode {
        &self.nodes[index]
    }

    /// All nodes, in creation order
    pub fn nodes(&self) -> &[BuildNode] {
        &self.nodes
    }

    /// Arena index of a package
    pub fn index_of(&self, directory: &str) -> Option<usize> {
        self.indices.get(directory).copied()
    }

    /// Number of packages in the order
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the order is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_for(&mut self, directory: &str, created: &mut Vec<usize>) -> usize {
        if let Some(&index) = self.indices.get(directory) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(BuildNode {
            package: Package::new(directory),
            build_order_after: Vec::new(),
        });
        self.indices.insert(directory.to_string(), index);
        created.push(index);
        index
    }
}

/// Calculate the build forest for a set of packages
///
/// Roots and children are ordered by directory. Dependencies on packages
/// outside `package_infos` are ignored.
pub fn calculate_build_order(package_infos: &PackageInfos) -> BuildOrder {
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut root_dirs: Vec<&str> = Vec::new();

    for (directory, info) in package_infos {
        let mut internal = info
            .dependencies
            .iter()
            .filter(|dep| package_infos.contains_key(&dep.directory))
            .peekable();
        if internal.peek().is_none() {
            root_dirs.push(directory);
        }
        for dep in internal {
            dependents.entry(dep.directory.as_str()).or_default().push(directory);
        }
    }

    let mut order = BuildOrder::default();
    let mut pending: Vec<usize> = Vec::new();

    for root in root_dirs {
        let index = order.node_for(root, &mut pending);
        order.roots.push(index);
    }

    while let Some(index) = pending.pop() {
        let directory = order.nodes[index].package.directory.clone();
        let children: Vec<usize> = dependents
            .get(directory.as_str())
            .map(|deps| {
                deps.iter()
                    .map(|dependent| order.node_for(dependent, &mut pending))
                    .collect()
            })
            .unwrap_or_default();
        order.nodes[index].build_order_after = children;
    }

    tracing::debug!(
        "Build order has {} packages under {} roots",
        order.len(),
        order.roots.len()
    );
    order
}
