// ── TTL Cache ──────────────────────────────────────────────────────────────
// Process-local mapping with per-key expiry. One lock serialises both the
// read and the write so the (value, expiry) pair is never torn, and the
// producer runs under the lock — at most one concurrent producer invocation
// per cache (single-flight). Suitable only for cheap producers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::atoms::error::CoreResult;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Return the cached value if fresh; otherwise run the producer under
    /// the lock, store its output with the given TTL, and return it.
    pub fn get_or_fetch(&self, key: &str, ttl: Duration, producer: impl FnOnce() -> V) -> V {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            if Instant::now() < entry.expires_at {
                return entry.value.clone();
            }
        }
        let value = producer();
        entries.insert(
            key.to_string(),
            Entry { value: value.clone(), expires_at: Instant::now() + ttl },
        );
        value
    }

    /// Fallible variant: a producer error is not cached, so the next caller
    /// retries.
    pub fn try_get_or_fetch(
        &self,
        key: &str,
        ttl: Duration,
        producer: impl FnOnce() -> CoreResult<V>,
    ) -> CoreResult<V> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.value.clone());
            }
        }
        let value = producer()?;
        entries.insert(
            key.to_string(),
            Entry { value: value.clone(), expires_at: Instant::now() + ttl },
        );
        Ok(value)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_builds_an_empty_cache_for_any_value_type() {
        // Construction must not require V: Clone.
        struct NoClone;
        let cache: TtlCache<NoClone> = TtlCache::default();
        assert_eq!(cache.purge_expired(), 0);
        let strings = TtlCache::<String>::default();
        assert_eq!(
            strings.get_or_fetch("k", Duration::from_secs(1), || "v".to_string()),
            "v"
        );
    }

    #[test]
    fn fresh_entry_skips_producer() {
        let cache: TtlCache<u32> = TtlCache::new();
        let calls = AtomicU32::new(0);
        let produce = || {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        };

        assert_eq!(cache.get_or_fetch("k", Duration::from_secs(60), produce), 7);
        assert_eq!(
            cache.get_or_fetch("k", Duration::from_secs(60), || {
                calls.fetch_add(1, Ordering::SeqCst);
                99
            }),
            7
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_entry_refetches() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.get_or_fetch("k", Duration::from_millis(0), || 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get_or_fetch("k", Duration::from_secs(60), || 2), 2);
    }

    #[test]
    fn producer_error_is_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new();
        let err: CoreResult<u32> =
            cache.try_get_or_fetch("k", Duration::from_secs(60), || Err("boom".into()));
        assert!(err.is_err());
        let ok = cache
            .try_get_or_fetch("k", Duration::from_secs(60), || Ok(5))
            .unwrap();
        assert_eq!(ok, 5);
    }

    #[test]
    fn purge_removes_only_expired() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.get_or_fetch("old", Duration::from_millis(0), || 1);
        cache.get_or_fetch("new", Duration::from_secs(60), || 2);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
