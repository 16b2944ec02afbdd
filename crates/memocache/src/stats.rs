//! Cache statistics tracking

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Hit/miss counters for one cache instance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Point-in-time view; callers hold the cache lock so `current_size` matches
    pub fn snapshot(&self, maxsize: Option<usize>, current_size: usize) -> CacheInfo {
        CacheInfo {
            hits: self.hits(),
            misses: self.misses(),
            maxsize,
            current_size,
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Snapshot returned by `cache_info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    /// Calls answered from the cache
    pub hits: u64,
    /// Calls that ran the computation
    pub misses: u64,
    /// Configured capacity, `None` when unbounded
    pub maxsize: Option<usize>,
    /// Entries currently stored
    pub current_size: usize,
}

impl CacheInfo {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheInfo(hits={}, misses={}, maxsize=", self.hits, self.misses)?;
        match self.maxsize {
            Some(n) => write!(f, "{}", n)?,
            None => f.write_str("None")?,
        }
        write!(f, ", currsize={})", self.current_size)
    }
}
