// src/provider/native.rs

//! Packages available from the platform package manager
//!
//! A [`NativeRepository`] translates abstract package names into system
//! package names, asks a [`RepositoryQuery`] backend which versions the
//! system can install, and turns them into native candidates. Native
//! candidates carry no requirements: the platform package manager resolves
//! their own dependencies at install time.

use super::{sort_candidates, MetadataError, MetadataProvider, PackageCandidate};
use crate::version::{native, ParseError, VersionId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Version syntax used by a package manager
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum NativeScheme {
    /// `[epoch:]upstream[-revision]`
    Debian,
    /// `[epoch:]version[-release]`
    Rpm,
    /// Versions already in distpack syntax
    Plain,
}

impl NativeScheme {
    pub fn parse_version(&self, text: &str) -> Result<VersionId, ParseError> {
        match self {
            NativeScheme::Debian => native::from_debian(text),
            NativeScheme::Rpm => native::from_rpm(text),
            NativeScheme::Plain => VersionId::parse(text),
        }
    }
}

/// Backend that lists installable versions of a system package
pub trait RepositoryQuery: Send + Sync {
    /// Native version strings for `system_name`; empty when unknown
    fn available_versions(&self, system_name: &str) -> Result<Vec<String>, MetadataError>;

    /// Syntax of the returned version strings
    fn scheme(&self) -> NativeScheme;

    /// Short label for log messages
    fn source_name(&self) -> &str;
}

/// Query backend over a fixed snapshot
#[derive(Debug, Clone)]
pub struct StaticQuery {
    scheme: NativeScheme,
    versions: BTreeMap<String, Vec<String>>,
}

impl StaticQuery {
    pub fn new(scheme: NativeScheme) -> Self {
        Self {
            scheme,
            versions: BTreeMap::new(),
        }
    }

    pub fn with_package(mut self, system_name: &str, versions: &[&str]) -> Self {
        self.versions
            .entry(system_name.to_string())
            .or_default()
            .extend(versions.iter().map(|v| v.to_string()));
        self
    }
}

impl RepositoryQuery for StaticQuery {
    fn available_versions(&self, system_name: &str) -> Result<Vec<String>, MetadataError> {
        Ok(self.versions.get(system_name).cloned().unwrap_or_default())
    }

    fn scheme(&self) -> NativeScheme {
        self.scheme
    }

    fn source_name(&self) -> &str {
        "static"
    }
}

/// Provider over the platform package manager
pub struct NativeRepository {
    query: Box<dyn RepositoryQuery>,
    names: BTreeMap<String, String>,
}

impl NativeRepository {
    pub fn new(query: impl RepositoryQuery + 'static) -> Self {
        Self {
            query: Box::new(query),
            names: BTreeMap::new(),
        }
    }

    /// Abstract name -> system package name table
    ///
    /// Names missing from the table are used as-is.
    pub fn with_name_map(mut self, names: BTreeMap<String, String>) -> Self {
        self.names = names;
        self
    }

    /// System package name for an abstract name
    pub fn system_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.names.get(name).map(String::as_str).unwrap_or(name)
    }
}

impl std::fmt::Debug for NativeRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRepository")
            .field("query", &self.query.source_name())
            .field("names", &self.names.len())
            .finish()
    }
}

impl MetadataProvider for NativeRepository {
    fn candidates(&self, name: &str) -> Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        let system_name = self.system_name(name);
        let raw = self.query.available_versions(system_name)?;
        let scheme = self.query.scheme();

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for text in raw {
            let version = scheme
                .parse_version(&text)
                .map_err(|e| MetadataError::Malformed {
                    source_name: self.query.source_name().to_string(),
                    package: system_name.to_string(),
                    message: e.to_string(),
                })?;
            if seen.insert(version.clone()) {
                candidates.push(Arc::new(PackageCandidate::native(name, version, system_name)));
            }
        }
        sort_candidates(&mut candidates);

        debug!(
            "{} offers {} native versions of {} ({})",
            self.query.source_name(),
            candidates.len(),
            name,
            system_name
        );
        Ok(candidates)
    }

    fn source_name(&self) -> &str {
        self.query.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Origin;

    #[test]
    fn test_native_name_mapping() {
        let query = StaticQuery::new(NativeScheme::Debian)
            .with_package("zlib1g-dev", &["1:1.2.11.dfsg-2", "1:1.2.13.dfsg-1"]);
        let mut names = BTreeMap::new();
        names.insert("zlib-dev".to_string(), "zlib1g-dev".to_string());
        let repo = NativeRepository::new(query).with_name_map(names);

        let list = repo.candidates("zlib-dev").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "zlib-dev");
        assert_eq!(list[0].system_name.as_deref(), Some("zlib1g-dev"));
        assert_eq!(list[0].origin, Origin::Native);
        assert!(list[0].version > list[1].version);
    }

    #[test]
    fn test_native_unknown_package_empty() {
        let repo = NativeRepository::new(StaticQuery::new(NativeScheme::Rpm));
        assert!(repo.candidates("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_native_malformed_version() {
        let query = StaticQuery::new(NativeScheme::Rpm).with_package("foo", &["???"]);
        let repo = NativeRepository::new(query);
        assert!(matches!(
            repo.candidates("foo"),
            Err(MetadataError::Malformed { .. })
        ));
    }

    #[test]
    fn test_native_duplicate_versions_collapse() {
        let query = StaticQuery::new(NativeScheme::Rpm).with_package("foo", &["1.0-1", "1:1.0-1"]);
        let repo = NativeRepository::new(query);
        assert_eq!(repo.candidates("foo").unwrap().len(), 1);
    }
}
