// src/error.rs

//! Crate-wide error type
//!
//! Every failure path in distpack returns one of these variants. The
//! user-actionable kinds are [`Error::Conflict`] and
//! [`Error::BuildStepFailed`]; [`Error::Parse`] and [`Error::Cycle`] point at
//! malformed input or an internal bug and carry the offending text or cycle
//! members for diagnosis.

use crate::executor::BuildStepFailure;
use crate::graph::{CycleError, LockfileError};
use crate::provider::MetadataError;
use crate::resolver::Conflict;
use crate::version::ParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by distpack
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed version, constraint or requirement text
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The metadata source failed; aborts the current resolution run
    #[error(transparent)]
    MetadataUnavailable(#[from] MetadataError),

    /// Resolution failed
    #[error("Dependency resolution failed: {0}")]
    Conflict(Box<Conflict>),

    /// Ordering found a cycle in the dependency graph
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// An edge points at a package missing from the graph
    #[error("Package {from} requires {to}, which is not in the dependency graph")]
    UnresolvedReference { from: String, to: String },

    /// A build step failed; no later step was run
    #[error(transparent)]
    BuildStepFailed(Box<BuildStepFailure>),

    /// Execution was cancelled or hit its deadline
    #[error("Build cancelled before step {step_index} completed")]
    Cancelled { step_index: usize },

    /// The plan completed but expected artifacts are absent
    #[error("Build finished but expected artifacts are missing: {}", display_paths(.0))]
    MissingArtifacts(Vec<PathBuf>),

    /// A package specification is structurally invalid
    #[error("Invalid package specification: {0}")]
    InvalidSpec(String),

    /// A template referenced a variable with no binding
    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    /// A native build tool is not installed
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// Patch could not be parsed or applied
    #[error("Patch error: {0}")]
    PatchError(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lockfile read/write failure
    #[error(transparent)]
    Lockfile(#[from] LockfileError),

    /// I/O with additional context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Raw I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Conflict> for Error {
    fn from(conflict: Conflict) -> Self {
        Error::Conflict(Box::new(conflict))
    }
}

impl From<BuildStepFailure> for Error {
    fn from(failure: BuildStepFailure) -> Self {
        Error::BuildStepFailed(Box::new(failure))
    }
}

impl Error {
    /// Whether the caller can fix this by adjusting the package specification
    /// or the build environment
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::BuildStepFailed(_))
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for distpack operations
pub type Result<T> = std::result::Result<T, Error>;
