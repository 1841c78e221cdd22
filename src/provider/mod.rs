// src/provider/mod.rs

//! Package metadata providers
//!
//! A provider answers one question: which versions of a package exist, and
//! what does each of them require. Candidates come back highest version
//! first; that order is the resolver's preference order.
//!
//! Providers:
//! - [`NativeRepository`]: packages the platform package manager can install
//! - [`BundledRepository`]: packages described by specification files
//! - [`MemoryProvider`]: a fixed in-memory snapshot
//! - [`ProviderPool`]: several providers merged into one
//! - [`CachedProvider`]: any provider behind a bounded [`MetadataCache`]

mod bundled;
mod cache;
mod memory;
mod native;
mod pool;
pub mod query;

pub use bundled::BundledRepository;
pub use cache::{CacheStats, CachedProvider, MetadataCache};
pub use memory::MemoryProvider;
pub use native::{NativeRepository, NativeScheme, RepositoryQuery, StaticQuery};
pub use pool::ProviderPool;

use crate::error::Result;
use crate::spec::{PackageSpec, Requirement};
use crate::version::VersionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of an underlying metadata source
///
/// Distinct from "package has no versions", which is an empty candidate list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata source {source_name} unavailable: {message}")]
    Unavailable {
        source_name: String,
        message: String,
    },

    #[error("Malformed metadata for package {package} from {source_name}: {message}")]
    Malformed {
        source_name: String,
        package: String,
        message: String,
    },
}

impl MetadataError {
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        MetadataError::Unavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Where a candidate comes from
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Origin {
    /// Installed by the platform package manager, never built here
    Native,
    /// Built from source as part of this run
    Bundled,
}

/// One concrete version of a package offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageCandidate {
    pub name: String,
    pub version: VersionId,
    pub origin: Origin,

    /// Outgoing requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,

    /// Name in the platform package manager, for native candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_name: Option<String>,

    /// Build description, for bundled candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Box<PackageSpec>>,
}

impl PackageCandidate {
    /// A package provided by the platform
    pub fn native(name: impl Into<String>, version: VersionId, system_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            origin: Origin::Native,
            requirements: Vec::new(),
            system_name: Some(system_name.into()),
            spec: None,
        }
    }

    /// A package built from its specification
    pub fn bundled(spec: PackageSpec) -> Result<Self> {
        Ok(Self {
            name: spec.package.name.clone(),
            version: spec.version_id()?,
            origin: Origin::Bundled,
            requirements: spec.requirements()?,
            system_name: None,
            spec: Some(Box::new(spec)),
        })
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn is_native(&self) -> bool {
        self.origin == Origin::Native
    }

    /// Name to use in generated dependency declarations
    pub fn declared_name(&self) -> &str {
        self.system_name.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for PackageCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ({})", self.name, self.version, self.origin)
    }
}

/// Source of package candidates
///
/// Implementations must be safe to share between concurrent resolution runs.
pub trait MetadataProvider: Send + Sync {
    /// All known candidates for `name`, highest version first
    ///
    /// An unknown package yields an empty list; `Err` is reserved for failures
    /// of the underlying source.
    fn candidates(&self, name: &str) -> std::result::Result<Vec<Arc<PackageCandidate>>, MetadataError>;

    /// Short label used in log messages and errors
    fn source_name(&self) -> &str;
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for Arc<P> {
    fn candidates(&self, name: &str) -> std::result::Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        (**self).candidates(name)
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

impl<P: MetadataProvider + ?Sized> MetadataProvider for Box<P> {
    fn candidates(&self, name: &str) -> std::result::Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        (**self).candidates(name)
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

/// Order candidates highest version first
///
/// Equal versions keep native before bundled so the order is total.
pub(crate) fn sort_candidates(candidates: &mut [Arc<PackageCandidate>]) {
    candidates.sort_by(|a, b| b.version.cmp(&a.version).then(a.origin.cmp(&b.origin)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_candidates_descending() {
        let mut list = vec![
            Arc::new(PackageCandidate::native("a", VersionId::parse("1.0").unwrap(), "a")),
            Arc::new(PackageCandidate::native("a", VersionId::parse("2.0").unwrap(), "a")),
            Arc::new(PackageCandidate::native("a", VersionId::parse("1.5").unwrap(), "a")),
        ];
        sort_candidates(&mut list);
        let versions: Vec<_> = list.iter().map(|c| c.version.to_string()).collect();
        assert_eq!(versions, vec!["2.0", "1.5", "1.0"]);
    }

    #[test]
    fn test_origin_strings() {
        assert_eq!(Origin::Native.to_string(), "native");
        assert_eq!("bundled".parse::<Origin>().unwrap(), Origin::Bundled);
    }

    #[test]
    fn test_declared_name() {
        let c = PackageCandidate::native("zlib-dev", VersionId::parse("1.2").unwrap(), "zlib1g-dev");
        assert_eq!(c.declared_name(), "zlib1g-dev");
        assert_eq!(c.to_string(), "zlib-dev-1.2 (native)");
    }
}
