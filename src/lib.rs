// src/lib.rs

//! distpack
//!
//! Builds native OS packages (RPM, DEB or plain tarballs) from abstract
//! package specifications. A package's requirements are resolved against
//! the packages the target system already provides and the bundled build
//! descriptions distpack carries; whatever the system lacks is built from
//! source, in dependency order, using the platform's own tooling.
//!
//! # Pipeline
//!
//! - `spec`: TOML package specifications and requirement text
//! - `resolver`: backtracking search over a `provider::MetadataProvider`
//! - `graph`: resolved dependency graph, build ordering, lockfiles
//! - `platform` + `plan`: per-family build files and the ordered build plan
//! - `executor`: runs the plan in a working directory
//!
//! The library never installs a `tracing` subscriber; binaries decide how
//! log output is shown.

pub mod config;
mod error;
pub mod executor;
pub mod graph;
pub mod plan;
pub mod platform;
pub mod progress;
pub mod provider;
pub mod resolver;
pub mod spec;
pub mod version;

pub use config::{CandidatePreference, DistpackConfig, ExecutorConfig, OriginTieBreak, ResolverConfig};
pub use error::{Error, Result};
pub use executor::{BuildResult, BuildStepFailure, CancellationToken, Executor};
pub use graph::{order, BuildOrder, CycleError, DependencyGraph, Lockfile};
pub use plan::{synthesize, BuildPlan, BuildStep};
pub use platform::{adapter_for, PlatformAdapter, TargetFamily};
pub use progress::{CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use provider::{MetadataProvider, Origin, PackageCandidate};
pub use resolver::{resolve, Conflict, Resolver};
pub use spec::{parse_spec, PackageSpec, Requirement};
pub use version::{Constraint, VersionId};
