// src/provider/memory.rs

//! Fixed in-memory provider

use super::{sort_candidates, MetadataError, MetadataProvider, PackageCandidate};
use std::collections::HashMap;
use std::sync::Arc;

/// Provider over a fixed set of candidates
///
/// Useful for replaying a metadata snapshot and for tests.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    label: String,
    packages: HashMap<String, Vec<Arc<PackageCandidate>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            label: "memory".to_string(),
            packages: HashMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add a candidate, keeping each package's list sorted
    pub fn add(&mut self, candidate: PackageCandidate) {
        let list = self.packages.entry(candidate.name.clone()).or_default();
        list.push(Arc::new(candidate));
        sort_candidates(list);
    }

    pub fn with_candidate(mut self, candidate: PackageCandidate) -> Self {
        self.add(candidate);
        self
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider for MemoryProvider {
    fn candidates(&self, name: &str) -> Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        Ok(self.packages.get(name).cloned().unwrap_or_default())
    }

    fn source_name(&self) -> &str {
        &self.label
    }
}
