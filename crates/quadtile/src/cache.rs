//! In-memory tile caches.
//!
//! A [`TileCache`] maps a [`TileKey`] to a value with a caller-supplied size
//! estimate. It is bounded by a hard capacity; an insertion that would exceed
//! the capacity first evicts least-recently-used entries until the cache plus
//! the new entry fits under the lower trim target. Lookups count as use.
//!
//! Each concern gets its own instance (decoded textures, child tile objects),
//! so one cannot starve the other.

use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::error::{Error, Result};
use crate::level::TileKey;

/// Default fraction of the capacity a full cache is trimmed back to.
pub const DEFAULT_TRIM_RATIO: f64 = 0.85;

/// Capacity settings for a [`TileCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Hard upper bound on the summed entry sizes.
    pub capacity: usize,
    /// Size the cache is trimmed down to when an insertion overflows.
    pub low_water: usize,
}

impl CacheConfig {
    /// Capacity with the default trim target.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            low_water: (capacity as f64 * DEFAULT_TRIM_RATIO) as usize,
        }
    }
}

struct Entry<V> {
    value: V,
    size: usize,
}

struct Inner<V> {
    entries: LruCache<TileKey, Entry<V>>,
    used: usize,
}

/// A thread-safe, size-bounded LRU cache keyed by tile.
pub struct TileCache<V> {
    name: String,
    capacity: usize,
    low_water: usize,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TileCache<V> {
    /// Create a cache, rejecting a zero capacity or a trim target above it.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::invalid_config("cache", "capacity must be non-zero"));
        }
        if config.low_water > config.capacity {
            return Err(Error::invalid_config(
                "cache",
                format!(
                    "trim target {} exceeds capacity {}",
                    config.low_water, config.capacity
                ),
            ));
        }
        Ok(Self {
            name: name.into(),
            capacity: config.capacity,
            low_water: config.low_water,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                used: 0,
            }),
        })
    }

    /// Look up a value, marking it most recently used.
    #[must_use]
    pub fn get(&self, key: &TileKey) -> Option<V> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    /// Whether a value is resident, without touching its recency.
    #[must_use]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.lock().entries.contains(key)
    }

    /// Insert or replace a value.
    ///
    /// Returns `false` without inserting if `size` alone exceeds the capacity.
    pub fn put(&self, key: TileKey, value: V, size: usize) -> bool {
        if size > self.capacity {
            tracing::debug!(cache = %self.name, %key, size, "entry larger than cache");
            return false;
        }

        let mut inner = self.lock();
        if let Some(old) = inner.entries.pop(&key) {
            inner.used -= old.size;
        }

        if inner.used + size > self.capacity {
            let mut evicted = 0usize;
            while inner.used + size > self.low_water {
                let Some((_, old)) = inner.entries.pop_lru() else {
                    break;
                };
                inner.used -= old.size;
                evicted += 1;
            }
            tracing::debug!(cache = %self.name, evicted, used = inner.used, "trimmed cache");
        }

        inner.entries.put(key, Entry { value, size });
        inner.used += size;
        true
    }

    /// Summed size of the resident entries.
    #[must_use]
    pub fn used_capacity(&self) -> usize {
        self.lock().used
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn low_water(&self) -> usize {
        self.low_water
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> std::fmt::Debug for TileCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("low_water", &self.low_water)
            .finish_non_exhaustive()
    }
}

/// Entry count bound for caches whose entries all weigh one unit.
#[must_use]
pub fn entry_count(count: usize) -> CacheConfig {
    CacheConfig::with_capacity(count.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn key(n: i32) -> TileKey {
        TileKey::new(3, n, n, Arc::from("test/3"))
    }

    #[test]
    fn test_put_then_get() {
        let cache = TileCache::new("test", CacheConfig::with_capacity(100)).unwrap();
        assert!(cache.is_empty());

        assert!(cache.put(key(1), vec![1, 2, 3], 3));
        assert_eq!(cache.get(&key(1)), Some(vec![1, 2, 3]));
        assert_eq!(cache.used_capacity(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(2)), None);
    }

    #[test]
    fn test_overwrite_replaces_size() {
        let cache = TileCache::new("test", CacheConfig::with_capacity(100)).unwrap();
        cache.put(key(1), "a", 10);
        cache.put(key(1), "b", 30);
        assert_eq!(cache.get(&key(1)), Some("b"));
        assert_eq!(cache.used_capacity(), 30);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_rejects_oversized_entry() {
        let cache = TileCache::new("test", CacheConfig::with_capacity(10)).unwrap();
        assert!(!cache.put(key(1), 0u8, 11));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(TileCache::<u8>::new("test", CacheConfig::with_capacity(0)).is_err());
        let inverted = CacheConfig {
            capacity: 10,
            low_water: 11,
        };
        assert!(matches!(
            TileCache::<u8>::new("test", inverted),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_overflow_trims_to_low_water_in_lru_order() {
        let cache = TileCache::new(
            "textures",
            CacheConfig {
                capacity: 1_000_000,
                low_water: 850_000,
            },
        )
        .unwrap();

        for n in 0..3 {
            assert!(cache.put(key(n), n, 300_000));
        }
        // Touch the oldest entry so the second one becomes least recently used.
        assert_eq!(cache.get(&key(0)), Some(0));

        // 1,200,000 bytes inserted in total.
        assert!(cache.put(key(3), 3, 300_000));

        assert!(cache.used_capacity() <= 850_000);
        assert!(!cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(0)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn test_contains_does_not_refresh_recency() {
        let cache = TileCache::new(
            "test",
            CacheConfig {
                capacity: 3,
                low_water: 2,
            },
        )
        .unwrap();
        cache.put(key(0), 0, 1);
        cache.put(key(1), 1, 1);
        cache.put(key(2), 2, 1);
        assert!(cache.contains(&key(0)));

        cache.put(key(3), 3, 1);
        assert!(!cache.contains(&key(0)));
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
    }

    #[test]
    fn test_entry_count_config() {
        let config = entry_count(0);
        assert_eq!(config.capacity, 1);
        assert_eq!(entry_count(1000).low_water, 850);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(
            ops in prop::collection::vec((0i32..40, 1usize..400, any::<bool>()), 1..200)
        ) {
            let cache = TileCache::new("prop", CacheConfig::with_capacity(1000)).unwrap();
            for (n, size, read) in ops {
                if read {
                    let _ = cache.get(&key(n));
                } else {
                    cache.put(key(n), n, size);
                    prop_assert!(cache.used_capacity() <= cache.capacity());
                    prop_assert_eq!(cache.get(&key(n)), Some(n));
                }
            }
        }
    }
}
