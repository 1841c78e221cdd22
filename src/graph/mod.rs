// src/graph/mod.rs

//! Resolved dependency graph
//!
//! A [`DependencyGraph`] is what a successful resolution produces: one node
//! per package, each holding the chosen candidate, and one edge per
//! requirement pointing at the package that satisfies it. Nodes and edges
//! are kept in name order so iteration, serialization and build ordering
//! are deterministic.
//!
//! The graph is handed to the orderer and synthesizer by shared reference
//! and never mutated after resolution.

mod lockfile;
mod order;

pub use lockfile::{LOCKFILE_NAME, LOCKFILE_VERSION, LockedPackage, LockedRequirement, Lockfile, LockfileError};
pub use order::{BuildOrder, CycleError, order};

use crate::provider::{Origin, PackageCandidate};
use crate::spec::{DependencyKind, Requirement};
use crate::version::Constraint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A "requires" edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Required package name
    pub to: String,
    /// Constraint the target's version satisfies
    pub constraint: Constraint,
    #[serde(default)]
    pub kind: DependencyKind,
}

/// Directed graph over resolved packages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, PackageCandidate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    edges: BTreeMap<String, Vec<Edge>>,
    /// Requirements the graph was resolved from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roots: Vec<Requirement>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node
    pub fn add_node(&mut self, candidate: PackageCandidate) {
        self.nodes.insert(candidate.name.clone(), candidate);
    }

    /// Add an edge from `from` to `edge.to`
    ///
    /// Endpoints are not checked here; [`order`] reports edges whose target
    /// is missing.
    pub fn add_edge(&mut self, from: &str, edge: Edge) {
        let list = self.edges.entry(from.to_string()).or_default();
        if !list.contains(&edge) {
            list.push(edge);
        }
    }

    pub fn add_root(&mut self, requirement: Requirement) {
        self.roots.push(requirement);
    }

    pub fn node(&self, name: &str) -> Option<&PackageCandidate> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = &PackageCandidate> {
        self.nodes.values()
    }

    /// Every edge as `(from, edge)`, grouped by source in name order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &Edge)> {
        self.edges
            .iter()
            .flat_map(|(from, list)| list.iter().map(move |e| (from.as_str(), e)))
    }

    /// Outgoing edges of one package
    pub fn dependencies(&self, name: &str) -> &[Edge] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Packages with an edge pointing at `name`
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.edges()
            .filter(|(_, e)| e.to == name)
            .map(|(from, _)| from)
            .collect()
    }

    pub fn roots(&self) -> &[Requirement] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count_origin(&self, origin: Origin) -> usize {
        self.nodes.values().filter(|c| c.origin == origin).count()
    }

    /// Bundled packages, in name order
    pub fn bundled(&self) -> impl Iterator<Item = &PackageCandidate> {
        self.nodes.values().filter(|c| c.origin == Origin::Bundled)
    }

    /// Native packages, in name order
    pub fn native(&self) -> impl Iterator<Item = &PackageCandidate> {
        self.nodes.values().filter(|c| c.origin == Origin::Native)
    }

    /// Serialize to JSON with stable key order
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::IoError(format!("Failed to serialize dependency graph: {}", e)))
    }

    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| crate::Error::IoError(format!("Failed to parse dependency graph: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionId;

    fn sample() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.add_root(Requirement::parse("app").unwrap());
        graph.add_node(
            PackageCandidate::native("zlib", VersionId::parse("1.2.13").unwrap(), "zlib1g"),
        );
        graph.add_node(
            PackageCandidate::native("app", VersionId::parse("2.0").unwrap(), "app")
                .with_requirement(Requirement::parse("zlib (>= 1.2)").unwrap()),
        );
        graph.add_edge(
            "app",
            Edge {
                to: "zlib".to_string(),
                constraint: Constraint::parse(">= 1.2").unwrap(),
                kind: DependencyKind::Runtime,
            },
        );
        graph
    }

    #[test]
    fn test_queries() {
        let graph = sample();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies("app").len(), 1);
        assert!(graph.dependencies("zlib").is_empty());
        assert_eq!(graph.dependents("zlib"), vec!["app"]);
        assert_eq!(graph.count_origin(Origin::Native), 2);
        assert_eq!(graph.bundled().count(), 0);
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let mut graph = sample();
        let edge = graph.dependencies("app")[0].clone();
        graph.add_edge("app", edge);
        assert_eq!(graph.edges().count(), 1);
    }

    #[test]
    fn test_json_roundtrip() {
        let graph = sample();
        let text = graph.to_json().unwrap();
        assert_eq!(DependencyGraph::from_json(&text).unwrap(), graph);
        assert_eq!(graph.to_json().unwrap(), text);
    }
}
