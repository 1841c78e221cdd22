// src/provider/bundled.rs

//! Packages described by specification files

use super::{sort_candidates, MetadataError, MetadataProvider, PackageCandidate};
use crate::error::{Error, Result};
use crate::spec::{parse_spec_file, PackageSpec};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Repository of bundled package specifications
///
/// Every version of every specification becomes one bundled candidate.
#[derive(Debug, Default, Clone)]
pub struct BundledRepository {
    packages: HashMap<String, Vec<Arc<PackageCandidate>>>,
}

impl BundledRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` specification in a directory
    ///
    /// Files are read in name order; subdirectories are searched one level
    /// deep so a package may keep its patches next to its specification.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        collect_specs(dir, &mut files, 1)?;
        files.sort();

        let mut repo = Self::new();
        for file in &files {
            debug!("Loading package specification {}", file.display());
            repo.add(parse_spec_file(file)?)?;
        }

        debug!(
            "Loaded {} bundled specifications from {}",
            files.len(),
            dir.display()
        );
        Ok(repo)
    }

    /// Add one specification
    pub fn add(&mut self, spec: PackageSpec) -> Result<()> {
        let candidate = PackageCandidate::bundled(spec)?;
        let list = self.packages.entry(candidate.name.clone()).or_default();
        if list.iter().any(|c| c.version == candidate.version) {
            return Err(Error::InvalidSpec(format!(
                "Duplicate specification for {} version {}",
                candidate.name, candidate.version
            )));
        }
        list.push(Arc::new(candidate));
        sort_candidates(list);
        Ok(())
    }

    pub fn with_spec(mut self, spec: PackageSpec) -> Result<Self> {
        self.add(spec)?;
        Ok(self)
    }

    /// Names of all bundled packages, sorted
    pub fn package_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.packages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn collect_specs(dir: &Path, out: &mut Vec<std::path::PathBuf>, depth: usize) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::IoError(format!(
            "Failed to read specification directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            if depth > 0 {
                collect_specs(&path, out, depth - 1)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            out.push(path);
        }
    }
    Ok(())
}

impl MetadataProvider for BundledRepository {
    fn candidates(&self, name: &str) -> std::result::Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        Ok(self.packages.get(name).cloned().unwrap_or_default())
    }

    fn source_name(&self) -> &str {
        "bundled"
    }
}
