// src/graph/order.rs

//! Build ordering
//!
//! Depth-first topological sort over a [`DependencyGraph`]. Nodes are
//! visited in name order and each node's dependencies in name order, so the
//! same graph always yields the same sequence. A dependency is emitted
//! before anything that requires it.

use super::DependencyGraph;
use crate::error::{Error, Result};
use crate::provider::PackageCandidate;
use std::collections::HashSet;
use std::fmt;

/// A dependency cycle found while ordering
///
/// `members` lists the cycle's packages in traversal order, starting at the
/// package the back-edge points to.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Circular dependency: {}", CyclePath(.members))]
pub struct CycleError {
    pub members: Vec<String>,
}

struct CyclePath<'a>(&'a [String]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.0 {
            write!(f, "{} -> ", name)?;
        }
        match self.0.first() {
            Some(first) => write!(f, "{}", first),
            None => Ok(()),
        }
    }
}

/// Packages of a graph in build order
#[derive(Debug, Clone)]
pub struct BuildOrder<'g> {
    graph: &'g DependencyGraph,
    packages: Vec<&'g PackageCandidate>,
}

impl<'g> BuildOrder<'g> {
    pub fn graph(&self) -> &'g DependencyGraph {
        self.graph
    }

    pub fn packages(&self) -> &[&'g PackageCandidate] {
        &self.packages
    }

    pub fn iter(&self) -> impl Iterator<Item = &'g PackageCandidate> + '_ {
        self.packages.iter().copied()
    }

    pub fn names(&self) -> Vec<&'g str> {
        self.packages.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a package in the order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.packages.iter().position(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

struct Walk<'g> {
    graph: &'g DependencyGraph,
    done: HashSet<&'g str>,
    /// In-progress nodes, in traversal order
    path: Vec<&'g str>,
    output: Vec<&'g PackageCandidate>,
}

impl<'g> Walk<'g> {
    fn visit(&mut self, name: &'g str) -> Result<()> {
        if self.done.contains(name) {
            return Ok(());
        }
        if let Some(start) = self.path.iter().position(|n| *n == name) {
            let members = self.path[start..].iter().map(|n| n.to_string()).collect();
            return Err(CycleError { members }.into());
        }

        self.path.push(name);

        let mut targets: Vec<&'g str> = self
            .graph
            .dependencies(name)
            .iter()
            .map(|e| e.to.as_str())
            .collect();
        targets.sort_unstable();
        targets.dedup();

        for target in targets {
            if !self.graph.contains(target) {
                return Err(Error::UnresolvedReference {
                    from: name.to_string(),
                    to: target.to_string(),
                });
            }
            self.visit(target)?;
        }

        self.path.pop();
        self.done.insert(name);
        if let Some(node) = self.graph.node(name) {
            self.output.push(node);
        }
        Ok(())
    }
}

/// Order a graph so every package follows all of its dependencies
///
/// Fails with [`CycleError`] on a cycle and with
/// [`Error::UnresolvedReference`] when an edge points at a missing node.
pub fn order(graph: &DependencyGraph) -> Result<BuildOrder<'_>> {
    let mut walk = Walk {
        graph,
        done: HashSet::new(),
        path: Vec::new(),
        output: Vec::with_capacity(graph.len()),
    };

    for node in graph.nodes() {
        walk.visit(&node.name)?;
    }

    Ok(BuildOrder {
        graph,
        packages: walk.output,
    })
}
