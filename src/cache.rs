//! Cache layer (C8): two version-scoped LRU caches — `SymbolCardCache` and
//! `GraphSliceCache` — sharing one generic implementation parameterized by
//! the cached value type. Grounded on the teacher's preference for `lru`'s
//! own ordering plus hand-rolled stats (the teacher's `mcp::cache` module
//! wraps `lru::LruCache` with hit/miss counters the same way); generalized
//! here to also bound by byte size and to support version-scoped eviction.

use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicUsize, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::model::{Edge, Symbol};

/// `{hits, misses, evictions, currentSize, entryCount, hitRate}` from spec §4.8.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub current_size_bytes: usize,
    pub entry_count: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry<V> {
    value: V,
    size_bytes: usize,
    expires_at: Option<i64>,
}

/// Core LRU bounded by `maxEntries` AND `maxSizeBytes` simultaneously, with
/// an optional per-entry TTL. Keys are opaque strings the caller constructs
/// (`repoId:id:versionId` for cards, `repoId:versionId:context` for slices);
/// `invalidate_version` matches any key containing `:version:`.
pub struct VersionScopedCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>, RandomState>>,
    max_entries: usize,
    max_size_bytes: usize,
    ttl_secs: Option<i64>,
    current_size_bytes: AtomicUsize,
    hits: AtomicUsize,
    misses: AtomicUsize,
    evictions: AtomicUsize,
}

impl<V: Clone> VersionScopedCache<V> {
    pub fn new(max_entries: usize, max_size_bytes: usize, ttl_secs: Option<i64>) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_entries: max_entries.max(1),
            max_size_bytes,
            ttl_secs,
            current_size_bytes: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            evictions: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = crate::utils::get_utc_timestamp();
        let mut guard = self.entries.lock();

        let expired = guard.peek(key).is_some_and(|e| e.expires_at.is_some_and(|exp| exp <= now));
        if expired {
            if let Some(removed) = guard.pop(key) {
                self.current_size_bytes.fetch_sub(removed.size_bytes, Ordering::Relaxed);
            }
        }

        match guard.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        let now = crate::utils::get_utc_timestamp();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|e| !e.expires_at.is_some_and(|exp| exp <= now))
    }

    /// Inserts or overwrites `key`, then evicts least-recently-used entries
    /// until both `maxEntries` and `maxSizeBytes` hold.
    pub fn set(&self, key: String, value: V, size_bytes: usize) {
        let now = crate::utils::get_utc_timestamp();
        let expires_at = self.ttl_secs.map(|ttl| now + ttl);
        let mut guard = self.entries.lock();

        if let Some(old) = guard.pop(&key) {
            self.current_size_bytes.fetch_sub(old.size_bytes, Ordering::Relaxed);
        }
        guard.put(
            key,
            CacheEntry {
                value,
                size_bytes,
                expires_at,
            },
        );
        self.current_size_bytes.fetch_add(size_bytes, Ordering::Relaxed);

        while guard.len() > self.max_entries || self.current_size_bytes.load(Ordering::Relaxed) > self.max_size_bytes {
            match guard.pop_lru() {
                Some((_, evicted)) => {
                    self.current_size_bytes.fetch_sub(evicted.size_bytes, Ordering::Relaxed);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    /// Removes every key containing `:versionId:` — cards and slices both
    /// embed the version id as a colon-delimited segment of their key.
    pub fn invalidate_version(&self, version_id: &str) -> usize {
        let marker = format!(":{version_id}:");
        let mut guard = self.entries.lock();
        let stale: Vec<String> = guard.iter().filter(|(k, _)| k.contains(&marker)).map(|(k, _)| k.clone()).collect();
        let mut removed = 0;
        for key in stale {
            if let Some(entry) = guard.pop(&key) {
                self.current_size_bytes.fetch_sub(entry.size_bytes, Ordering::Relaxed);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.current_size_bytes.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed) as u64,
            misses: self.misses.load(Ordering::Relaxed) as u64,
            evictions: self.evictions.load(Ordering::Relaxed) as u64,
            current_size_bytes: self.current_size_bytes.load(Ordering::Relaxed),
            entry_count: self.entries.lock().len(),
        }
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// Cached unit for `SymbolCardCache`: a symbol plus its owning edges, the
/// shape the slice engine re-hydrates into a [`crate::slice::Card`] without
/// re-querying the store.
#[derive(Debug, Clone)]
pub struct CachedCard {
    pub symbol: Symbol,
    pub outgoing: Vec<Edge>,
    pub incoming: Vec<Edge>,
}

pub type SymbolCardCache = VersionScopedCache<CachedCard>;
pub type GraphSliceCache = VersionScopedCache<crate::slice::GraphSlice>;

/// Rough byte-size estimate used for the `maxSizeBytes` bound — exact
/// serialized size isn't needed, just a stable-enough proxy so the eviction
/// loop terminates and roughly tracks real memory pressure.
pub fn estimate_card_size(card: &CachedCard) -> usize {
    64 + card.symbol.name.len() + card.symbol.summary.as_ref().map_or(0, String::len) + (card.outgoing.len() + card.incoming.len()) * 48
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, Range, SymbolKind};

    fn card(name: &str) -> CachedCard {
        CachedCard {
            symbol: Symbol::new(
                name.to_string(),
                "r",
                FileId::new(1).unwrap(),
                SymbolKind::Function,
                name,
                "rust",
                Range::new(1, 0, 2, 0),
                "fp",
                1,
            ),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    #[test]
    fn lru_evicts_exactly_one_key_past_max_entries() {
        let cache: VersionScopedCache<CachedCard> = VersionScopedCache::new(2, 1_000_000, None);
        cache.set("r:a:v1".into(), card("a"), 10);
        cache.set("r:b:v1".into(), card("b"), 10);
        cache.get("r:a:v1"); // touch a so it's MRU, b is LRU
        cache.set("r:c:v1".into(), card("c"), 10);

        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("r:b:v1").is_none());
        assert!(cache.get("r:a:v1").is_some());
        assert!(cache.get("r:c:v1").is_some());
    }

    #[test]
    fn invalidate_version_removes_only_matching_keys() {
        let cache: VersionScopedCache<CachedCard> = VersionScopedCache::new(10, 1_000_000, None);
        cache.set("r:a:v1".into(), card("a"), 10);
        cache.set("r:b:v2".into(), card("b"), 10);

        let removed = cache.invalidate_version("v1");
        assert_eq!(removed, 1);
        assert!(cache.get("r:a:v1").is_none());
        assert!(cache.get("r:b:v2").is_some());
    }

    #[test]
    fn size_bound_evicts_even_under_entry_limit() {
        let cache: VersionScopedCache<CachedCard> = VersionScopedCache::new(10, 25, None);
        cache.set("r:a:v1".into(), card("a"), 10);
        cache.set("r:b:v1".into(), card("b"), 10);
        cache.set("r:c:v1".into(), card("c"), 10);

        assert!(cache.stats().current_size_bytes <= 25);
        assert!(cache.stats().evictions >= 1);
    }

    #[test]
    fn stats_track_hits_and_misses_and_reset() {
        let cache: VersionScopedCache<CachedCard> = VersionScopedCache::new(10, 1_000_000, None);
        cache.set("r:a:v1".into(), card("a"), 10);
        cache.get("r:a:v1");
        cache.get("r:missing:v1");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);

        cache.reset_stats();
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn ttl_expires_entries_lazily() {
        let cache: VersionScopedCache<CachedCard> = VersionScopedCache::new(10, 1_000_000, Some(-1));
        cache.set("r:a:v1".into(), card("a"), 10);
        assert!(cache.get("r:a:v1").is_none());
    }
}
