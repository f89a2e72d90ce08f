//! Bounded instance cache with LRU eviction and TTL invalidation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use plughub_core::config::cache::CacheConfig;

/// Cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held, expired ones included until purged.
    pub size: usize,
    /// Capacity.
    pub max_size: usize,
    /// Successful lookups.
    pub hits: u64,
    /// Failed lookups, expired entries included.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub hit_rate: f64,
}

/// Per-entry counters from [`InstanceCache::entry_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    /// Successful lookups of this entry since it was inserted.
    pub access_count: u64,
    /// Time since insertion.
    pub age: Duration,
    /// Time since the last successful lookup, or since insertion.
    pub idle: Duration,
}

struct CacheEntry<V> {
    value: V,
    inserted: Instant,
    last_accessed: Instant,
    /// Recency tick used for LRU ordering.
    last_access: u64,
    access_count: u64,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl<V> CacheState<V> {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// String-keyed cache of cloneable values.
///
/// Inserting a new key into a full cache evicts the least recently accessed
/// entry. Entries older than the TTL are dropped when looked up.
pub struct InstanceCache<V> {
    state: Mutex<CacheState<V>>,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> InstanceCache<V> {
    /// Creates a cache holding at most `max_size` entries for `ttl` each.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tick: 0,
                hits: 0,
                misses: 0,
            }),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_size, Duration::from_secs(config.ttl_seconds))
    }

    /// Inserts or replaces `key`.
    pub fn set(&self, key: &str, value: V) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if !state.entries.contains_key(key) && state.entries.len() >= self.max_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                debug!(key = %oldest, "Evicted least recently used instance");
            }
        }

        let last_access = state.touch();
        let now = Instant::now();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted: now,
                last_accessed: now,
                last_access,
                access_count: 0,
            },
        );
    }

    /// Looks up `key`, counting a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if self.expire(&mut state, key) {
            state.misses += 1;
            return None;
        }

        let tick = state.touch();
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = tick;
                entry.last_accessed = Instant::now();
                entry.access_count += 1;
                let value = entry.value.clone();
                state.hits += 1;
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Whether a live entry exists. Does not count as an access.
    pub fn has(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !self.expire(&mut state, key) && state.entries.contains_key(key)
    }

    /// Counters for a live entry. Does not count as an access.
    pub fn entry_stats(&self, key: &str) -> Option<EntryStats> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if self.expire(&mut state, key) {
            return None;
        }
        state.entries.get(key).map(|entry| EntryStats {
            access_count: entry.access_count,
            age: entry.inserted.elapsed(),
            idle: entry.last_accessed.elapsed(),
        })
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.remove(key).map(|entry| entry.value)
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purges expired entries. Returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now.duration_since(entry.inserted) <= self.ttl);
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let lookups = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }

    /// Drops `key` if it has outlived the TTL. Returns whether it did.
    fn expire(&self, state: &mut CacheState<V>, key: &str) -> bool {
        let expired = state
            .entries
            .get(key)
            .is_some_and(|entry| entry.inserted.elapsed() > self.ttl);
        if expired {
            state.entries.remove(key);
        }
        expired
    }
}

impl<V: Clone + Send + 'static> InstanceCache<V> {
    /// Spawns a task that calls [`cleanup`](Self::cleanup) every `interval`
    /// for as long as the cache is alive.
    pub fn spawn_cleanup(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.cleanup();
                    }
                    None => break,
                }
            }
        })
    }
}

impl<V> std::fmt::Debug for InstanceCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_size: usize) -> InstanceCache<u32> {
        InstanceCache::new(max_size, Duration::from_secs(60))
    }

    #[test]
    fn test_lru_evicts_oldest_insert() {
        let cache = cache(2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3));

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_read_refreshes_recency() {
        let cache = cache(2);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.set("c", 3);

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let cache = cache(2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_stats_track_accesses() {
        let cache = cache(4);
        cache.set("k", 7);
        assert_eq!(cache.entry_stats("k").unwrap().access_count, 0);

        tokio::time::advance(Duration::from_millis(30)).await;
        cache.get("k");
        tokio::time::advance(Duration::from_millis(20)).await;
        cache.get("k");
        assert!(cache.has("k"));

        let stats = cache.entry_stats("k").unwrap();
        assert_eq!(stats.access_count, 2);
        assert_eq!(stats.age, Duration::from_millis(50));
        assert_eq!(stats.idle, Duration::ZERO);

        cache.set("k", 8);
        assert_eq!(cache.entry_stats("k").unwrap().access_count, 0);
        assert_eq!(cache.entry_stats("missing"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_and_cleanup() {
        let cache = InstanceCache::new(10, Duration::from_millis(100));
        cache.set("short", 1);
        tokio::time::advance(Duration::from_millis(60)).await;
        cache.set("fresh", 2);
        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(!cache.has("short"));
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.len(), 1);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_cleanup_task() {
        let cache = Arc::new(InstanceCache::new(10, Duration::from_millis(50)));
        cache.set("k", 1u32);
        let task = InstanceCache::spawn_cleanup(&cache, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.len(), 0);

        drop(cache);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(task.is_finished());
    }
}
