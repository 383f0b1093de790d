//! In-memory LRU tier bounded by item count and decoded byte cost.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, SharedImage};

/// Default maximum number of images held in memory.
pub const DEFAULT_COUNT_LIMIT: usize = 100;

/// Default maximum total decoded size held in memory (100 MiB).
pub const DEFAULT_COST_LIMIT: usize = 100 * 1024 * 1024;

struct Entries {
    lru: LruCache<CacheKey, SharedImage>,
    total_cost: usize,
}

/// In-memory cache for decoded images.
///
/// Lookups take the read lock, so concurrent readers never serialize; inserts,
/// evictions and clears take the write lock.
pub struct MemoryImageCache {
    entries: RwLock<Entries>,
    cost_limit: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Decoded size of an image, used as its cost.
#[must_use]
pub fn image_cost(image: &image::DynamicImage) -> usize {
    image.as_bytes().len()
}

impl MemoryImageCache {
    /// Creates a cache holding at most `count_limit` images and
    /// `cost_limit` decoded bytes.
    #[must_use]
    pub fn new(count_limit: usize, cost_limit: usize) -> Self {
        let cap = NonZeroUsize::new(count_limit).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(Entries {
                lru: LruCache::new(cap),
                total_cost: 0,
            }),
            cost_limit,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up an image, counting the hit or miss.
    ///
    /// Recency is refreshed only when the write lock is free; a contended
    /// promotion is skipped rather than waited for.
    pub fn get(&self, key: &CacheKey) -> Option<SharedImage> {
        let found = self.entries.read().lru.peek(key).cloned();

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
            if let Some(mut entries) = self.entries.try_write() {
                entries.lru.promote(key);
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
        }

        found
    }

    /// Returns true if the key is held in memory.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().lru.contains(key)
    }

    /// Stores an image, evicting least recently used entries until both
    /// ceilings hold. Images larger than the whole cost budget are skipped.
    pub fn put(&self, key: CacheKey, image: SharedImage) {
        let cost = image_cost(&image);
        if cost > self.cost_limit {
            debug!(key = %key, cost, limit = self.cost_limit, "Image exceeds memory budget, not cached");
            return;
        }

        let mut entries = self.entries.write();
        if let Some((_, displaced)) = entries.lru.push(key.clone(), image) {
            entries.total_cost = entries.total_cost.saturating_sub(image_cost(&displaced));
        }
        entries.total_cost += cost;

        while entries.total_cost > self.cost_limit {
            let Some((evicted, img)) = entries.lru.pop_lru() else {
                break;
            };
            entries.total_cost = entries.total_cost.saturating_sub(image_cost(&img));
            debug!(key = %evicted, "Evicted image from memory cache");
        }

        debug!(key = %key, cost, total = entries.total_cost, "Stored image in memory cache");
    }

    /// Drops every image.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.lru.clear();
        entries.total_cost = 0;
        debug!("Cleared memory image cache");
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.entries.read().lru.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total decoded bytes currently held.
    pub fn total_cost(&self) -> usize {
        self.entries.read().total_cost
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let entries = self.entries.read();
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: entries.lru.len(),
            cost: entries.total_cost,
        }
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_COUNT_LIMIT, DEFAULT_COST_LIMIT)
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("cost_limit", &self.cost_limit)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Statistics about memory tier performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Current decoded bytes held.
    pub cost: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} bytes), {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.cost, self.hit_rate, self.hits, self.misses
        )
    }
}
