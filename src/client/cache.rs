//! In-memory response cache keyed by request fingerprint.
//!
//! Entries expire after a TTL. When the cache is full, the oldest half (by
//! insertion order) is evicted before the new entry goes in.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::log_component;

use super::types::QueryResult;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

struct CacheEntry {
    result: QueryResult,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first
    order: VecDeque<String>,
}

/// Bounded TTL cache for successful, non-streamed query results.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            DEFAULT_CACHE_MAX_ENTRIES,
        )
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fingerprint of agent, message and session.
    ///
    /// The conversation id is deliberately absent: two identical messages in
    /// the same session share an entry regardless of conversation.
    pub fn fingerprint(agent_id: &str, message: &str, session_id: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(agent_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(message.as_bytes());
        hasher.update([0u8]);
        hasher.update(session_id.unwrap_or("").as_bytes());
        hex::encode(hasher.finalize())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A panic while holding the lock leaves the map usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a fresh entry. Expired entries are removed on access.
    pub fn get(&self, key: &str) -> Option<QueryResult> {
        let mut inner = self.lock();
        let expired = inner
            .entries
            .get(key)
            .map(|entry| entry.stored_at.elapsed() > self.ttl);
        let fresh = match expired {
            Some(false) => inner.entries.get(key).map(|entry| entry.result.clone()),
            Some(true) => {
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
                None
            }
            None => None,
        };
        match fresh {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Store a result, evicting the oldest half first when full.
    pub fn put(&self, key: &str, result: QueryResult) {
        if self.max_entries == 0 {
            return;
        }
        let mut inner = self.lock();

        if inner.entries.remove(key).is_some() {
            inner.order.retain(|k| k != key);
        }

        if inner.entries.len() >= self.max_entries {
            let evict = ((inner.entries.len() + 1) / 2).max(1);
            for _ in 0..evict {
                if let Some(oldest) = inner.order.pop_front() {
                    inner.entries.remove(&oldest);
                }
            }
            log_component!(
                debug,
                "cache",
                "Evicted oldest entries",
                evicted = evict,
                remaining = inner.entries.len()
            );
        }

        inner.order.push_back(key.to_string());
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str) -> QueryResult {
        QueryResult::text(text)
    }

    #[test]
    fn test_put_then_get() {
        let cache = ResponseCache::default();
        cache.put("k1", result("a"));
        assert_eq!(cache.get("k1").unwrap().text, "a");
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_miss_counts() {
        let cache = ResponseCache::default();
        assert!(cache.get("nope").is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_expired_entry_removed() {
        let cache = ResponseCache::new(Duration::from_millis(50), 100);
        cache.put("k1", result("a"));
        std::thread::sleep(Duration::from_millis(100));
        assert!(cache.get("k1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_evicts_oldest_half() {
        let cache = ResponseCache::new(Duration::from_secs(60), 4);
        for key in ["k1", "k2", "k3", "k4"] {
            cache.put(key, result(key));
        }
        cache.put("k5", result("k5"));

        assert_eq!(cache.len(), 3);
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_none());
        assert!(cache.get("k3").is_some());
        assert!(cache.get("k5").is_some());
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let cache = ResponseCache::new(Duration::from_secs(60), 5);
        for i in 0..50 {
            cache.put(&format!("k{}", i), result("x"));
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_single_slot_cache() {
        let cache = ResponseCache::new(Duration::from_secs(60), 1);
        cache.put("a", result("a"));
        cache.put("b", result("b"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_overwrite_moves_to_newest() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.put("a", result("a1"));
        cache.put("b", result("b"));
        cache.put("a", result("a2"));
        cache.put("c", result("c"));
        // "b" was oldest after the overwrite
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().text, "a2");
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(Duration::from_secs(60), 0);
        cache.put("a", result("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::default();
        cache.put("a", result("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint() {
        let a = ResponseCache::fingerprint("agent", "hello", Some("s1"));
        assert_eq!(a, ResponseCache::fingerprint("agent", "hello", Some("s1")));
        assert_ne!(a, ResponseCache::fingerprint("agent", "hello", Some("s2")));
        assert_ne!(a, ResponseCache::fingerprint("agent", "hello", None));
        assert_ne!(a, ResponseCache::fingerprint("other", "hello", Some("s1")));
        assert_eq!(a.len(), 64);
        // Separator keeps field boundaries distinct
        assert_ne!(
            ResponseCache::fingerprint("ab", "c", None),
            ResponseCache::fingerprint("a", "bc", None)
        );
    }
}
