//! Keyed cache with per-entry expiry
//!
//! Entries are evicted lazily on read; there is no capacity bound and no
//! background sweep. Methods take `&mut self`, so a cache shared between
//! tasks must be wrapped in a lock by its owner.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// TTL applied by [`TtlCache::set_default`]
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// TTL cache
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Store `value` until `ttl` has elapsed
    pub fn set(&mut self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Store `value` with the one hour default TTL
    pub fn set_default(&mut self, key: K, value: V) {
        self.set(key, value, DEFAULT_TTL);
    }

    /// Fetch a live entry. A stale entry is removed and reported as a miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = self.entries.get(key)?.is_expired(Instant::now());
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, including stale ones not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_before_expiry() {
        let mut cache = TtlCache::new();
        cache.set("stats", 42u32, Duration::from_millis(100));

        assert_eq!(cache.get("stats"), Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_purged_on_read() {
        let mut cache = TtlCache::new();
        cache.set("stats".to_string(), 42u32, Duration::from_millis(100));

        tokio::time::advance(Duration::from_millis(101)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("stats"), None);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_is_one_hour() {
        let mut cache = TtlCache::new();
        cache.set_default(1u8, "value".to_string());

        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        assert_eq!(cache.get(&1u8), Some("value".to_string()));

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(cache.get(&1u8), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let mut cache = TtlCache::new();
        cache.set("k", 1, Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(80)).await;
        cache.set("k", 2, Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(80)).await;

        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_clear_and_remove() {
        let mut cache = TtlCache::new();
        cache.set_default("a", 1);
        cache.set_default("b", 2);

        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.get("a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }
}
