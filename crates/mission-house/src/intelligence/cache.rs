//! Bounded lookup cache with per-key exclusion.
//!
//! ## LRU eviction
//!
//! When an insert would exceed `capacity`, expired entries are dropped
//! first; otherwise the least-recently-accessed entry is evicted.
//!
//! ## Single flight
//!
//! [`LookupCache::get_or_try_insert`] serializes callers per key, so at most
//! one fetch for a key is in flight. Failed fetches are not cached; the next
//! waiter tries again.

use crate::types::{normalize_address, SchoolType};
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    cached_at: Instant,
    /// Access tick for LRU ordering.
    last_accessed: u64,
}

/// In-memory cache keyed by string.
pub struct LookupCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    inflight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    capacity: usize,
    ttl: Duration,
    tick: AtomicU64,
}

/// Cache key for a school lookup: normalized address and school type.
pub fn school_key(address: &str, school_type: SchoolType) -> String {
    format!("{}:{}", normalize_address(address), school_type)
}

impl<V: Clone> LookupCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            inflight: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        entry.cached_at.elapsed() >= self.ttl
    }

    /// A fresh cached value for `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        let tick = self.next_tick();
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) => self.is_expired(entry),
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.last_accessed = tick;
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: &str, value: V) {
        let tick = self.next_tick();
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            self.evict(&mut entries);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                cached_at: Instant::now(),
                last_accessed: tick,
            },
        );
    }

    fn evict(&self, entries: &mut HashMap<String, CacheEntry<V>>) {
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        if entries.len() < before {
            return;
        }
        if let Some(lru) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        {
            tracing::debug!("evicting LRU lookup: {lru}");
            entries.remove(&lru);
        }
    }

    /// Return the cached value for `key`, or run `fetch` and cache its
    /// success. Concurrent callers for one key share a single fetch.
    pub async fn get_or_try_insert<E, F, Fut>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let lock = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let result = fetch().await;
        if let Ok(value) = &result {
            self.insert(key, value.clone());
        }
        drop(guard);
        self.inflight.remove(key);
        result
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    /// Number of cached entries (including expired).
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_school_key_normalizes() {
        assert_eq!(
            school_key("12 Example St,  Mount Waverley", SchoolType::Primary),
            "12 example st mount waverley:primary"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let cache = LookupCache::new(4, Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = LookupCache::new(3, Duration::from_secs(3600));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        let _ = cache.get("a");
        let _ = cache.get("c");

        cache.insert("d", 4);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_evicted_before_lru() {
        let cache = LookupCache::new(2, Duration::from_secs(10));
        cache.insert("old", 1);
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test]
    async fn test_single_fetch_per_key() {
        let cache = Arc::new(LookupCache::new(8, Duration::from_secs(3600)));
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert("addr:primary", || async {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>("Mount Waverley PS".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "Mount Waverley PS");
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_not_cached() {
        let cache: LookupCache<u32> = LookupCache::new(4, Duration::from_secs(3600));
        let first = cache
            .get_or_try_insert("k", || async { Err::<u32, _>("boom") })
            .await;
        assert!(first.is_err());
        assert!(cache.get("k").is_none());

        let second = cache.get_or_try_insert("k", || async { Ok::<_, &str>(7) }).await;
        assert_eq!(second, Ok(7));
        assert_eq!(cache.get("k"), Some(7));
    }

    #[tokio::test]
    async fn test_failed_fetches_release_inflight_locks() {
        let cache: LookupCache<u32> = LookupCache::new(4, Duration::from_secs(3600));
        for i in 0..100 {
            let key = format!("addr-{i}:primary");
            let result = cache
                .get_or_try_insert(&key, || async { Err::<u32, _>("lookup failed") })
                .await;
            assert!(result.is_err());
        }
        assert!(cache.inflight.is_empty());
        assert!(cache.is_empty());

        let _ = cache.get_or_try_insert("ok", || async { Ok::<_, &str>(1) }).await;
        assert!(cache.inflight.is_empty());
    }
}
