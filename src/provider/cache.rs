// src/provider/cache.rs

//! Bounded metadata cache
//!
//! Caches candidate lists by package name so repeated lookups, within one
//! resolution run and across runs, do not re-query the metadata source.
//! The cache is an explicit value passed to whoever needs it; there is no
//! process-wide instance. Failed lookups are never cached.

use super::{MetadataError, MetadataProvider, PackageCandidate};
use crate::config::CacheConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Cached candidate list
struct CacheEntry {
    candidates: Vec<Arc<PackageCandidate>>,
    created_at: Instant,
    last_used: u64,
    hits: u64,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
    misses: u64,
}

/// Thread-safe, size-bounded, least-recently-used candidate cache
pub struct MetadataCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    ttl: Option<Duration>,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl MetadataCache {
    /// Create a cache holding at most `max_entries` package names
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                tick: 0,
                misses: 0,
            }),
            max_entries: max_entries.max(1),
            ttl: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.max_entries);
        cache.ttl = config.ttl_secs.map(Duration::from_secs);
        cache
    }

    /// Entries older than `ttl` are treated as absent
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Get cached candidates
    pub fn get(&self, name: &str) -> Option<Vec<Arc<PackageCandidate>>> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.entries.get(name) {
            Some(entry) => self.ttl.is_some_and(|ttl| entry.created_at.elapsed() > ttl),
            None => {
                inner.misses = inner.misses.saturating_add(1);
                return None;
            }
        };
        if expired {
            inner.entries.remove(name);
            inner.misses = inner.misses.saturating_add(1);
            return None;
        }

        let entry = inner.entries.get_mut(name)?;
        entry.last_used = tick;
        entry.hits = entry.hits.saturating_add(1);
        Some(entry.candidates.clone())
    }

    /// Store candidates, evicting the least recently used entry when full
    pub fn put(&self, name: &str, candidates: Vec<Arc<PackageCandidate>>) {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(name) && inner.entries.len() >= self.max_entries {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                trace!("Evicting {} from metadata cache", key);
                inner.entries.remove(&key);
            }
        }

        inner.entries.insert(
            name.to_string(),
            CacheEntry {
                candidates,
                created_at: Instant::now(),
                last_used: tick,
                hits: 0,
            },
        );
    }

    /// Get cached candidates or fetch them
    ///
    /// The lock is not held while `fetch` runs, so two threads missing on the
    /// same name may both fetch; the later result wins.
    pub fn get_or_fetch<F>(&self, name: &str, fetch: F) -> Result<Vec<Arc<PackageCandidate>>, MetadataError>
    where
        F: FnOnce() -> Result<Vec<Arc<PackageCandidate>>, MetadataError>,
    {
        if let Some(cached) = self.get(name) {
            return Ok(cached);
        }
        let fetched = fetch()?;
        self.put(name, fetched.clone());
        Ok(fetched)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().entries.contains_key(name)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            max_entries: self.max_entries,
            total_hits: inner.entries.values().fold(0u64, |acc, e| acc.saturating_add(e.hits)),
            misses: inner.misses,
        }
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub total_hits: u64,
    pub misses: u64,
}

/// A provider whose lookups go through a shared [`MetadataCache`]
pub struct CachedProvider<P> {
    inner: P,
    cache: Arc<MetadataCache>,
}

impl<P: MetadataProvider> CachedProvider<P> {
    pub fn new(inner: P, cache: Arc<MetadataCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: MetadataProvider> MetadataProvider for CachedProvider<P> {
    fn candidates(&self, name: &str) -> Result<Vec<Arc<PackageCandidate>>, MetadataError> {
        self.cache.get_or_fetch(name, || self.inner.candidates(name))
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::VersionId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn candidate(name: &str) -> Arc<PackageCandidate> {
        Arc::new(PackageCandidate::native(name, VersionId::parse("1.0").unwrap(), name))
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = MetadataCache::new(4);
        assert!(cache.get("a").is_none());
        cache.put("a", vec![candidate("a")]);
        assert_eq!(cache.get("a").unwrap().len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_cache_hit_counter_saturates() {
        let cache = MetadataCache::new(4);
        cache.put("a", vec![candidate("a")]);
        cache.put("b", vec![candidate("b")]);
        for entry in cache.inner.lock().entries.values_mut() {
            entry.hits = u64::MAX;
        }
        assert!(cache.get("a").is_some());
        assert_eq!(cache.stats().total_hits, u64::MAX);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let cache = MetadataCache::new(2);
        cache.put("a", vec![candidate("a")]);
        cache.put("b", vec![candidate("b")]);
        cache.get("a");
        cache.put("c", vec![candidate("c")]);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_cache_ttl_expiry() {
        let cache = MetadataCache::new(2).with_ttl(Duration::ZERO);
        cache.put("a", vec![candidate("a")]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("a").is_none());
    }

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MetadataProvider for Counting {
        fn candidates(&self, name: &str) -> Result<Vec<Arc<PackageCandidate>>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MetadataError::unavailable("counting", "offline"))
            } else {
                Ok(vec![candidate(name)])
            }
        }

        fn source_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_cached_provider_queries_once() {
        let cache = Arc::new(MetadataCache::new(8));
        let provider = CachedProvider::new(
            Counting {
                calls: AtomicUsize::new(0),
                fail: false,
            },
            cache.clone(),
        );
        provider.candidates("a").unwrap();
        provider.candidates("a").unwrap();
        assert_eq!(provider.into_inner().calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains("a"));
    }

    #[test]
    fn test_cached_provider_does_not_cache_errors() {
        let cache = Arc::new(MetadataCache::new(8));
        let provider = CachedProvider::new(
            Counting {
                calls: AtomicUsize::new(0),
                fail: true,
            },
            cache.clone(),
        );
        assert!(provider.candidates("a").is_err());
        assert!(provider.candidates("a").is_err());
        assert!(!cache.contains("a"));
        assert_eq!(provider.into_inner().calls.load(Ordering::SeqCst), 2);
    }
}
