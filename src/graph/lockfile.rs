// src/graph/lockfile.rs

//! Lockfile for resolved dependency graphs
//!
//! A lockfile records the outcome of a resolution so the same package set
//! can be checked or rebuilt later. It stores each package's name, version
//! and origin plus its requirements; bundled build descriptions are not
//! stored and must be reloaded from their specification files.
//!
//! # Example
//!
//! ```toml
//! version = 1
//! roots = [{ name = "myapp", constraint = ">= 1.0" }]
//!
//! [[packages]]
//! name = "myapp"
//! version = "1.2.0"
//! origin = "bundled"
//! dependencies = [{ name = "zlib-dev", constraint = ">= 1.2", kind = "build" }]
//!
//! [[packages]]
//! name = "zlib-dev"
//! version = "1.2.13"
//! origin = "native"
//! system_name = "zlib1g-dev"
//! ```
//!
//! Packages are written in name order and dependencies in declaration
//! order, so serializing the same graph always gives the same text.

use super::{DependencyGraph, Edge};
use crate::provider::{Origin, PackageCandidate};
use crate::spec::{DependencyKind, Marker, Requirement};
use crate::version::{Constraint, VersionId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Current lockfile format version
pub const LOCKFILE_VERSION: u32 = 1;

/// Default lockfile name
pub const LOCKFILE_NAME: &str = "distpack.lock";

#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("Failed to read lockfile: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse lockfile: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize lockfile: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Lockfile version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Invalid lockfile entry {name}: {reason}")]
    InvalidEntry { name: String, reason: String },

    #[error("Package {name} is locked at {expected} but resolved to {found}")]
    PackageMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Package {0} is locked but missing from the graph")]
    MissingPackage(String),

    #[error("Package {0} is in the graph but not in the lockfile")]
    UnlockedPackage(String),
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// A requirement as written in a lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedRequirement {
    pub name: String,
    #[serde(default = "any_constraint", skip_serializing_if = "is_any")]
    pub constraint: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub marker: Marker,
    #[serde(default, skip_serializing_if = "is_default")]
    pub kind: DependencyKind,
}

fn any_constraint() -> String {
    "*".to_string()
}

fn is_any(text: &str) -> bool {
    text == "*"
}

impl LockedRequirement {
    fn from_requirement(requirement: &Requirement) -> Self {
        Self {
            name: requirement.name.clone(),
            constraint: requirement.constraint.to_string(),
            marker: requirement.marker,
            kind: requirement.kind,
        }
    }

    fn to_requirement(&self) -> Result<Requirement, LockfileError> {
        let constraint = Constraint::parse(&self.constraint).map_err(|e| LockfileError::InvalidEntry {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Requirement::new(self.name.clone(), constraint)
            .with_marker(self.marker)
            .with_kind(self.kind))
    }
}

/// One resolved package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<LockedRequirement>,
}

/// Lockfile root structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Lockfile format version
    pub version: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<LockedRequirement>,

    #[serde(default)]
    pub packages: Vec<LockedPackage>,
}

impl Lockfile {
    /// Capture a resolved graph
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let packages = graph
            .nodes()
            .map(|node| LockedPackage {
                name: node.name.clone(),
                version: node.version.to_string(),
                origin: node.origin,
                system_name: node.system_name.clone(),
                dependencies: node
                    .requirements
                    .iter()
                    .map(LockedRequirement::from_requirement)
                    .collect(),
            })
            .collect();

        Self {
            version: LOCKFILE_VERSION,
            roots: graph
                .roots()
                .iter()
                .map(LockedRequirement::from_requirement)
                .collect(),
            packages,
        }
    }

    /// Rebuild the graph described by this lockfile
    ///
    /// Bundled nodes come back without their build description.
    pub fn to_graph(&self) -> Result<DependencyGraph, LockfileError> {
        let mut graph = DependencyGraph::new();
        for root in &self.roots {
            graph.add_root(root.to_requirement()?);
        }

        for package in &self.packages {
            let version = VersionId::parse(&package.version).map_err(|e| LockfileError::InvalidEntry {
                name: package.name.clone(),
                reason: e.to_string(),
            })?;
            let requirements = package
                .dependencies
                .iter()
                .map(LockedRequirement::to_requirement)
                .collect::<Result<Vec<_>, _>>()?;

            for requirement in &requirements {
                graph.add_edge(
                    &package.name,
                    Edge {
                        to: requirement.name.clone(),
                        constraint: requirement.constraint.clone(),
                        kind: requirement.kind,
                    },
                );
            }
            graph.add_node(PackageCandidate {
                name: package.name.clone(),
                version,
                origin: package.origin,
                requirements,
                system_name: package.system_name.clone(),
                spec: None,
            });
        }

        Ok(graph)
    }

    /// Load a lockfile from a path
    pub fn from_file(path: &Path) -> Result<Self, LockfileError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse lockfile text
    pub fn from_toml_str(content: &str) -> Result<Self, LockfileError> {
        let mut lockfile: Lockfile = toml::from_str(content)?;

        if lockfile.version > LOCKFILE_VERSION {
            return Err(LockfileError::VersionMismatch {
                expected: LOCKFILE_VERSION,
                found: lockfile.version,
            });
        }

        lockfile.packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lockfile)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, LockfileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the lockfile, replacing any existing file atomically
    pub fn write_to_file(&self, path: &Path) -> Result<(), LockfileError> {
        let content = self.to_toml_string()?;
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut temp, content.as_bytes())?;
        temp.persist(path).map_err(|e| LockfileError::ReadError(e.error))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LockedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Check that a freshly resolved graph matches the locked versions
    ///
    /// Returns every mismatch, not just the first.
    pub fn verify(&self, graph: &DependencyGraph) -> Result<(), Vec<LockfileError>> {
        let mut errors = Vec::new();

        for locked in &self.packages {
            match graph.node(&locked.name) {
                Some(node) => {
                    let found = node.version.to_string();
                    if found != locked.version || node.origin != locked.origin {
                        errors.push(LockfileError::PackageMismatch {
                            name: locked.name.clone(),
                            expected: format!("{} ({})", locked.version, locked.origin),
                            found: format!("{} ({})", found, node.origin),
                        });
                    }
                }
                None => errors.push(LockfileError::MissingPackage(locked.name.clone())),
            }
        }

        for node in graph.nodes() {
            if self.get(&node.name).is_none() {
                errors.push(LockfileError::UnlockedPackage(node.name.clone()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
