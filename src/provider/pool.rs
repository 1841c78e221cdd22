// src/provider/pool.rs

//! Composite provider

use super::{sort_candidates, MetadataError, MetadataProvider, PackageCandidate};
use std::sync::Arc;
use tracing::trace;

/// Several providers merged into one candidate list
///
/// Typically the platform's native repository plus the bundled
/// specifications. Any member failing fails the whole query.
#[derive(Default)]
pub struct ProviderPool {
    members: Vec<Box<dyn MetadataProvider>>,
}

impl ProviderPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl MetadataProvider + 'static) -> Self {
        self.members.push(Box::new(provider));
        self
    }

    pub fn push(&mut self, provider: Box<dyn MetadataProvider>) {
        self.members.push(provider);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl MetadataProvider for ProviderPool {
    fn candidates(&self, name: &str) -> Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        let mut all = Vec::new();
        for member in &self.members {
            let found = member.candidates(name)?;
            trace!("{}: {} candidates for {}", member.source_name(), found.len(), name);
            all.extend(found);
        }
        sort_candidates(&mut all);
        Ok(all)
    }

    fn source_name(&self) -> &str {
        "pool"
    }
}
