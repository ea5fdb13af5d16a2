use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::key::CacheKey;
use crate::config::CacheConfig;

/// A stored value and the moment it was written
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Snapshot returned by [`ResponseCache::stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory response cache keyed by request fingerprint.
///
/// Entries expire `ttl_seconds` after they were stored. Expiry is lazy: a stale
/// entry stays in the map until a lookup for its key removes it. The map is
/// unbounded.
///
/// One instance is built at startup and shared behind an `Arc`. Every
/// operation takes the same mutex, so per-key reads and writes are
/// linearizable and `clear` cannot interleave with a `get` or `put`.
pub struct ResponseCache<V = String> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up a live entry. Returns `None` when disabled, absent or expired;
    /// an expired entry is removed before returning.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = entries
            .get(key)
            .map(|entry| self.is_expired(entry, now));

        match expired {
            Some(false) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                entries.get(key).map(|entry| entry.value.clone())
            }
            Some(true) => {
                debug!(key = %key.short(), "Cache entry expired, removing");
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or overwrite an entry stamped with the current time.
    pub fn put(&self, key: CacheKey, value: V) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
        };
        debug!(key = %key.short(), "Storing cache entry");
        self.lock().insert(key, entry);
    }

    /// Replace the store with an empty one and reset the counters.
    pub fn clear(&self) {
        let mut entries = self.lock();
        *entries = HashMap::new();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.config.enabled,
            size: self.len(),
            ttl_seconds: self.config.ttl_seconds,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Number of stored entries, expired ones included until they are looked up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at).as_secs() > self.config.ttl_seconds
    }

    // Every critical section is a single map call, so a poisoned lock still
    // guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
