//! Bounded result caches
//!
//! Solving is deterministic for a given declaration and requested pair, so
//! results (including failures) are memoised in a bounded LRU. The same LRU
//! with its statistics is available as `BoundedCache` for other memoised
//! lookups.

use crate::solver::SignatureKey;
use crate::types::{TypeArguments, TypePair};
use lru::LruCache;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// LRU map that counts hits, misses and evictions
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    stats: CacheStats,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    /// Zero capacity falls back to the default
    pub fn with_capacity(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.stats.total_queries += 1;
        match self.entries.get(key) {
            Some(value) => {
                self.stats.cache_hits += 1;
                Some(value.clone())
            }
            None => {
                self.stats.cache_misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some((evicted, _)) = self.entries.push(key, value) {
            // `push` hands back the old entry on a plain update as well
            if !self.entries.contains(&evicted) {
                self.stats.evictions += 1;
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
    }
}

impl<K: Hash + Eq, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Bounded cache of `(declaration, pair) -> bindings` results
pub struct SolverCache {
    solutions: BoundedCache<(SignatureKey, TypePair), Option<TypeArguments>>,
}

/// Cache performance statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub evictions: usize,
    pub total_queries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_queries as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cache Stats: {} hits, {} misses, {} evictions, {:.2}% hit ratio",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.hit_ratio() * 100.0
        )
    }
}

impl Default for SolverCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY.get())
    }

    /// Zero capacity falls back to the default
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            solutions: BoundedCache::with_capacity(max_size),
        }
    }

    /// Look up a cached result. The outer `Option` is the cache hit, the inner
    /// one the solver outcome.
    pub fn get(&mut self, key: SignatureKey, pair: &TypePair) -> Option<Option<TypeArguments>> {
        // LruCache::get needs an owned key for tuple lookups
        self.solutions.get(&(key, pair.clone()))
    }

    pub fn insert(&mut self, key: SignatureKey, pair: TypePair, result: Option<TypeArguments>) {
        self.solutions.insert((key, pair), result);
    }

    pub fn stats(&self) -> CacheStats {
        self.solutions.stats()
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn clear(&mut self) {
        self.solutions.clear();
    }
}
