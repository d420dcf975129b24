//! Dependency graph engine
//!
//! The graph is an arena of nodes keyed by package directory. Edges point
//! from a package to each of its dependencies. Dependency cycles are not
//! valid, but they must not break a build: [`build_graph`] removes edges
//! until the graph is acyclic and reports which edges it removed, so callers
//! can drop exactly those edges from the dependency lists they hand to the
//! scheduler.

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Bfs;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::package::{PackageInfos, PackageInfosWithBuildTime};

/// Dependency graph over package directories
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<String, ()>,
    indices: BTreeMap<String, NodeIndex>,
}

/// An edge removed to break a dependency cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnippedEdge {
    /// The dependent package
    pub from: String,
    /// The dependency it no longer points to
    pub to: String,
}

impl fmt::Display for SnippedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Non-fatal conditions found while narrowing the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphWarning {
    /// No base package is connected to any upto package
    NoLinkedUpto,
}

impl fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLinkedUpto => write!(
                f,
                "NO_LINKED_UPTO: none of the packages to build lead to the --upto packages"
            ),
        }
    }
}

/// For every package, the set of packages it reaches (itself included)
pub type Reachability = BTreeMap<String, BTreeSet<String>>;

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph with one node per package and one edge per dependency
    ///
    /// Cycles are kept; see [`build_graph`] for the acyclic version.
    pub fn from_package_infos(package_infos: &PackageInfos) -> Self {
        let mut graph = Self::new();
        for directory in package_infos.keys() {
            graph.add_package(directory);
        }
        for (directory, info) in package_infos {
            for dep in &info.dependencies {
                graph.add_dependency(directory, &dep.directory);
            }
        }
        graph
    }

    /// Add a package node; adding an existing package is a no-op
    pub fn add_package(&mut self, directory: &str) {
        if !self.indices.contains_key(directory) {
            let idx = self.graph.add_node(directory.to_string());
            self.indices.insert(directory.to_string(), idx);
        }
    }

    /// Declare that `from` depends on `to`, adding missing nodes
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        self.add_package(from);
        self.add_package(to);
        let (a, b) = (self.indices[from], self.indices[to]);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Remove the edge `from -> to`; returns whether it existed
    pub fn remove_dependency(&mut self, from: &str, to: &str) -> bool {
        let (Some(&a), Some(&b)) = (self.indices.get(from), self.indices.get(to)) else {
            return false;
        };
        match self.graph.find_edge(a, b) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Remove a package and all of its edges
    pub fn remove_package(&mut self, directory: &str) {
        if let Some(idx) = self.indices.remove(directory) {
            self.graph.remove_node(idx);
        }
    }

    /// Package directories in sorted order
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    /// Whether the graph contains a package
    pub fn contains(&self, directory: &str) -> bool {
        self.indices.contains_key(directory)
    }

    /// Whether `from` directly depends on `to`
    pub fn has_dependency(&self, from: &str, to: &str) -> bool {
        match (self.indices.get(from), self.indices.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Direct dependencies of a package, sorted
    pub fn dependencies_of(&self, directory: &str) -> Vec<&str> {
        let Some(&idx) = self.indices.get(directory) else {
            return Vec::new();
        };
        let mut deps: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        deps.sort_unstable();
        deps
    }

    fn out_degree(&self, directory: &str) -> usize {
        self.indices.get(directory).map_or(0, |&idx| {
            self.graph.neighbors_directed(idx, Direction::Outgoing).count()
        })
    }

    /// Number of packages
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the graph has no packages
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Strongly connected components that form cycles
    ///
    /// Each cycle is sorted by directory, and cycles are sorted by their first
    /// member. A single package depending on itself is a cycle too.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || (scc.len() == 1 && self.graph.find_edge(scc[0], scc[0]).is_some())
            })
            .map(|scc| {
                let mut members: Vec<String> = scc.iter().map(|&n| self.graph[n].clone()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Whether the graph has no cycles
    pub fn is_acyclic(&self) -> bool {
        self.find_cycles().is_empty()
    }

    /// Packages reachable from `directory` by following dependencies,
    /// including `directory` itself
    pub fn reachable_from(&self, directory: &str) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let Some(&start) = self.indices.get(directory) else {
            return reached;
        };
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(idx) = bfs.next(&self.graph) {
            reached.insert(self.graph[idx].clone());
        }
        reached
    }

    /// All-pairs reachability: one BFS per package
    pub fn reachability(&self) -> Reachability {
        self.packages()
            .map(|p| (p.to_string(), self.reachable_from(p)))
            .collect()
    }
}

/// Build the dependency graph and snip every cycle out of it
///
/// Returns the acyclic graph and the edges that were removed.
pub fn build_graph(package_infos: &PackageInfos) -> (DependencyGraph, Vec<SnippedEdge>) {
    let mut graph = DependencyGraph::from_package_infos(package_infos);
    let snipped = snip_cycles(&mut graph);
    (graph, snipped)
}

/// Remove edges until the graph is acyclic
///
/// For each cycle, the member with the fewest outgoing edges loses its edge to
/// the member preceding it in the cycle's sorted member list. Every round
/// removes at least one edge, so this terminates.
pub fn snip_cycles(graph: &mut DependencyGraph) -> Vec<SnippedEdge> {
    let mut snipped = Vec::new();

    loop {
        let cycles = graph.find_cycles();
        if cycles.is_empty() {
            break;
        }

        let before = snipped.len();
        for cycle in &cycles {
            if let Some(edge) = choose_edge_to_snip(graph, cycle) {
                tracing::debug!("Snipping dependency {edge} to break cycle {}", cycle.join(", "));
                graph.remove_dependency(&edge.from, &edge.to);
                snipped.push(edge);
            }
        }
        if snipped.len() == before {
            // a strongly connected component always has an internal edge
            break;
        }
    }

    snipped
}

fn choose_edge_to_snip(graph: &DependencyGraph, cycle: &[String]) -> Option<SnippedEdge> {
    if let [only] = cycle {
        return graph.has_dependency(only, only).then(|| SnippedEdge {
            from: only.clone(),
            to: only.clone(),
        });
    }

    let (position, node) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(i, n)| (graph.out_degree(n), *i))?;

    let predecessor = &cycle[(position + cycle.len() - 1) % cycle.len()];
    let target = if graph.has_dependency(node, predecessor) {
        predecessor
    } else {
        cycle
            .iter()
            .find(|other| *other != node && graph.has_dependency(node, other))?
    };

    Some(SnippedEdge {
        from: node.clone(),
        to: target.clone(),
    })
}

/// Keep only packages lying on a dependency path from an upto package down to
/// a base package
///
/// A package survives if it depends (directly, transitively, or by being one)
/// on a base package and an upto package depends on it in the same sense.
/// Returns [`GraphWarning::NoLinkedUpto`] when a non-empty graph ends up empty.
pub fn build_linked_subset(
    graph: &mut DependencyGraph,
    base_packages: &[String],
    upto_packages: &[String],
) -> Option<GraphWarning> {
    let reach = graph.reachability();
    let was_empty = graph.is_empty();

    let unlinked: Vec<String> = graph
        .packages()
        .filter(|node| {
            let leads_to_base = reach
                .get(*node)
                .is_some_and(|reached| base_packages.iter().any(|b| reached.contains(b)));
            let reached_from_upto = upto_packages
                .iter()
                .filter_map(|u| reach.get(u))
                .any(|reached| reached.contains(*node));
            !(leads_to_base && reached_from_upto)
        })
        .map(ToString::to_string)
        .collect();

    for node in &unlinked {
        graph.remove_package(node);
    }

    if !was_empty && graph.is_empty() {
        tracing::warn!("{}", GraphWarning::NoLinkedUpto);
        Some(GraphWarning::NoLinkedUpto)
    } else {
        None
    }
}

/// Compute the dirty packages of a (linked subset) graph
///
/// A package is dirty if it has no valid build time, if one of its direct
/// dependencies has no build time or a later one, or if any package it
/// depends on (transitively, within the graph) is dirty. With `force` every
/// package of the graph is dirty.
pub fn propagate_dirty(
    graph: &DependencyGraph,
    package_infos: &PackageInfosWithBuildTime,
    force: bool,
) -> BTreeSet<String> {
    let mut dirty: BTreeSet<String> = BTreeSet::new();

    for directory in graph.packages() {
        let Some(pkg) = package_infos.get(directory) else {
            continue;
        };
        if force {
            dirty.insert(directory.to_string());
            continue;
        }
        let Some(built_at) = pkg.last_build_time else {
            tracing::debug!("{directory} is dirty: changed since its last build");
            dirty.insert(directory.to_string());
            continue;
        };
        let stale_dependency = pkg.info.dependencies.iter().find(|dep| {
            package_infos
                .get(&dep.directory)
                .is_some_and(|d| match d.last_build_time {
                    Some(t) => t > built_at,
                    None => true,
                })
        });
        if let Some(dep) = stale_dependency {
            tracing::debug!("{directory} is dirty: dependency {dep} is newer");
            dirty.insert(directory.to_string());
        }
    }

    let reach = graph.reachability();
    let seeds = dirty.clone();
    for (directory, reached) in &reach {
        if !dirty.contains(directory) && reached.iter().any(|r| seeds.contains(r)) {
            tracing::debug!("{directory} is dirty: depends on a dirty package");
            dirty.insert(directory.clone());
        }
    }

    dirty
}
