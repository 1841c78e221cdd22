// src/resolver/conflict.rs

//! Conflict types for dependency resolution
//!
//! A conflict names the package whose requirements could not be met and the
//! requirements responsible, each with the package that introduced it.
//! Conflicts are meant to be shown to users as-is.

use crate::provider::PackageCandidate;
use crate::spec::Requirement;
use std::fmt;
use std::sync::Arc;

/// A requirement together with the package that declared it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlamedRequirement {
    /// Requiring package; `None` for a root requirement
    pub required_by: Option<String>,
    pub requirement: Requirement,
}

impl BlamedRequirement {
    pub fn requirer(&self) -> &str {
        self.required_by.as_deref().unwrap_or("<root>")
    }
}

impl fmt::Display for BlamedRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.requirer(), self.requirement)
    }
}

/// A conflict between package requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// The chosen version of a package violates a later requirement
    UnsatisfiableConstraint {
        package: String,
        chosen_version: String,
        requirement: BlamedRequirement,
    },
    /// No known version of a package meets these requirements together
    ///
    /// The set is minimal: dropping any one requirement leaves a set that
    /// some known version satisfies.
    ConflictingConstraints {
        package: String,
        requirements: Vec<BlamedRequirement>,
        available: Vec<String>,
    },
    /// No provider knows the package at all
    MissingPackage {
        package: String,
        required_by: Vec<String>,
    },
}

impl Conflict {
    /// The package whose requirements failed
    pub fn package(&self) -> &str {
        match self {
            Conflict::UnsatisfiableConstraint { package, .. }
            | Conflict::ConflictingConstraints { package, .. }
            | Conflict::MissingPackage { package, .. } => package,
        }
    }

    /// The blamed requirements
    pub fn requirements(&self) -> Vec<&BlamedRequirement> {
        match self {
            Conflict::UnsatisfiableConstraint { requirement, .. } => vec![requirement],
            Conflict::ConflictingConstraints { requirements, .. } => requirements.iter().collect(),
            Conflict::MissingPackage { .. } => Vec::new(),
        }
    }

    /// Every package name involved: the failed package and its requirers
    pub fn packages(&self) -> Vec<String> {
        let mut names = vec![self.package().to_string()];
        let requirers: Vec<String> = match self {
            Conflict::MissingPackage { required_by, .. } => required_by.clone(),
            _ => self
                .requirements()
                .iter()
                .filter_map(|r| r.required_by.clone())
                .collect(),
        };
        for name in requirers {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// True when the blamed requirements cannot be met by any known version,
    /// independent of other choices the resolver made
    pub fn is_intrinsic(&self) -> bool {
        !matches!(self, Conflict::UnsatisfiableConstraint { .. })
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::UnsatisfiableConstraint {
                package,
                chosen_version,
                requirement,
            } => write!(
                f,
                "Package {} version {} does not satisfy {}",
                package, chosen_version, requirement
            ),
            Conflict::ConflictingConstraints {
                package,
                requirements,
                available,
            } => {
                write!(f, "No version of package {} satisfies:", package)?;
                for req in requirements {
                    write!(f, "\n  - {}", req)?;
                }
                if available.is_empty() {
                    write!(f, "\n  (no versions available)")
                } else {
                    write!(f, "\n  (available: {})", available.join(", "))
                }
            }
            Conflict::MissingPackage {
                package,
                required_by,
            } => {
                write!(
                    f,
                    "Missing package {} required by {}",
                    package,
                    required_by.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for Conflict {}

/// Whether any candidate meets every requirement in `set`
pub(crate) fn jointly_satisfiable(
    candidates: &[Arc<PackageCandidate>],
    set: &[&BlamedRequirement],
) -> bool {
    candidates.iter().any(|c| {
        set.iter()
            .all(|r| r.requirement.admits(c.origin, &c.version))
    })
}

/// Shrink an unsatisfiable requirement set by deletion
///
/// Each requirement is dropped in turn if the rest is still unsatisfiable.
/// The result has no redundant member.
pub(crate) fn minimize(
    candidates: &[Arc<PackageCandidate>],
    requirements: Vec<BlamedRequirement>,
) -> Vec<BlamedRequirement> {
    let mut kept = requirements;
    let mut i = 0;
    while i < kept.len() {
        let rest: Vec<&BlamedRequirement> = kept
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, r)| r)
            .collect();
        if !rest.is_empty() && !jointly_satisfiable(candidates, &rest) {
            kept.remove(i);
        } else {
            i += 1;
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{Constraint, VersionId};

    fn blamed(by: Option<&str>, name: &str, constraint: &str) -> BlamedRequirement {
        BlamedRequirement {
            required_by: by.map(str::to_string),
            requirement: Requirement::new(name, Constraint::parse(constraint).unwrap()),
        }
    }

    fn candidates(versions: &[&str]) -> Vec<Arc<PackageCandidate>> {
        versions
            .iter()
            .map(|v| Arc::new(PackageCandidate::native("a", VersionId::parse(v).unwrap(), "a")))
            .collect()
    }

    #[test]
    fn test_minimize_drops_redundant() {
        let avail = candidates(&["1.5", "0.9"]);
        let set = vec![
            blamed(None, "a", ">= 1.0"),
            blamed(Some("c"), "a", ">= 0.1"),
            blamed(Some("b"), "a", "< 1.0"),
        ];
        let min = minimize(&avail, set);
        assert_eq!(min.len(), 2);
        assert_eq!(min[0].required_by, None);
        assert_eq!(min[1].required_by.as_deref(), Some("b"));
    }

    #[test]
    fn test_minimize_single_unsatisfiable() {
        let avail = candidates(&["1.9"]);
        let min = minimize(&avail, vec![blamed(None, "a", ">= 2.0"), blamed(Some("x"), "a", "*")]);
        assert_eq!(min, vec![blamed(None, "a", ">= 2.0")]);
    }

    #[test]
    fn test_conflict_display_and_packages() {
        let conflict = Conflict::ConflictingConstraints {
            package: "a".to_string(),
            requirements: vec![blamed(None, "a", ">= 1.0"), blamed(Some("b"), "a", "< 1.0")],
            available: vec!["1.5".to_string(), "0.9".to_string()],
        };
        let text = conflict.to_string();
        assert!(text.contains("No version of package a satisfies"));
        assert!(text.contains("<root> requires a (>= 1.0)"));
        assert!(text.contains("b requires a (< 1.0)"));
        assert_eq!(conflict.packages(), vec!["a".to_string(), "b".to_string()]);
        assert!(conflict.is_intrinsic());
    }

    #[test]
    fn test_missing_package_display() {
        let conflict = Conflict::MissingPackage {
            package: "ghost".to_string(),
            required_by: vec!["app".to_string()],
        };
        assert_eq!(conflict.to_string(), "Missing package ghost required by app");
    }
}
