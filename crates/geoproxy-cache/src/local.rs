//! In-process store with per-entry TTL and LRU eviction.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::metrics::CacheMetrics;

/// Entry stored in the in-process store.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached payload.
    pub value: V,
    /// Instant after which the entry is no longer served. `None` when the TTL
    /// is too large to represent.
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    /// Check if this entry has expired at `now`.
    ///
    /// An entry is still valid at exactly its expiry instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

/// Map with per-entry TTL and an optional capacity bound.
///
/// Expired entries are removed lazily, when a `get` finds them. When the
/// capacity is reached, inserting a new key evicts the least recently used
/// entry; both `get` and `set` count as a use.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use geoproxy_cache::BoundedTtlStore;
///
/// let store = BoundedTtlStore::new(Some(2));
/// store.set("a", 1, Duration::from_secs(60));
/// store.set("b", 2, Duration::from_secs(60));
/// store.get("a");
/// store.set("c", 3, Duration::from_secs(60));
///
/// assert_eq!(store.get("a"), Some(1));
/// assert_eq!(store.get("b"), None);
/// ```
pub struct BoundedTtlStore<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    metrics: Option<CacheMetrics>,
}

impl<V: Clone> BoundedTtlStore<V> {
    /// Creates a store on the system clock. `None` means unbounded.
    pub fn new(max_entries: Option<usize>) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Creates a store on the given clock.
    pub fn with_clock(max_entries: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        let entries = match max_entries.and_then(NonZeroUsize::new) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };

        Self {
            entries: Mutex::new(entries),
            clock,
            metrics: None,
        }
    }

    /// Reports evictions and entry counts to `metrics`.
    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the value for `key` if present and not expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {},
        }

        entries.pop(key);
        let remaining = entries.len();
        drop(entries);

        debug!(key = %key, "Expired entry removed on read");
        self.record_eviction("ttl", remaining);
        None
    }

    /// Inserts or overwrites `key`, expiring `ttl` from now.
    ///
    /// A zero TTL means "do not cache": any existing entry is dropped and
    /// the next `get` misses.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if ttl.is_zero() {
            entries.pop(&key);
            return;
        }

        let entry = CacheEntry {
            value,
            expires_at: now.checked_add(ttl),
        };

        let evicted = match entries.push(key, entry) {
            // push devuelve el par reemplazado o el LRU desalojado
            Some((old_key, _)) if !entries.contains(&old_key) => Some(old_key),
            _ => None,
        };
        let remaining = entries.len();
        drop(entries);

        if let Some(old_key) = evicted {
            debug!(key = %old_key, "Least recently used entry evicted");
            self.record_eviction("capacity", remaining);
        } else if let Some(metrics) = &self.metrics {
            metrics.update_entry_count(remaining);
        }
    }

    /// Removes `key` unconditionally. Returns true if it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        let removed = entries.pop(key).is_some();
        let remaining = entries.len();
        drop(entries);

        if let Some(metrics) = &self.metrics {
            metrics.update_entry_count(remaining);
        }
        removed
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
        if let Some(metrics) = &self.metrics {
            metrics.update_entry_count(0);
        }
    }

    /// Returns the number of stored entries, including expired ones that
    /// have not been read since they expired.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the capacity bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        let cap = self.entries.lock().cap().get();
        (cap != usize::MAX).then_some(cap)
    }

    fn record_eviction(&self, reason: &'static str, remaining: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_eviction(reason);
            metrics.update_entry_count(remaining);
        }
    }
}
