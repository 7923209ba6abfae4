//! Local (L1) tier: a bounded LRU map with per-entry expiry.
//!
//! Reads touch the entry, so eviction removes the least recently used key.
//! Every operation holds the lock only for the map mutation itself.

use super::entry::{CacheEntry, CachedValue};
use crate::clock::Clock;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Debug)]
pub struct LocalCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    evictions: AtomicU64,
}

impl LocalCache {
    pub fn new(max_size: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(max_size)),
            clock,
            evictions: AtomicU64::new(0),
        }
    }

    /// Fetch a live value, dropping it if it has expired
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();

        let expired = entries.peek(key)?.is_expired(now);
        if expired {
            entries.pop(key);
            trace!(key = key, "L1 entry expired on read");
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Whether a live entry exists, without touching recency
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Insert, evicting the least recently used entry when full
    pub fn insert(&self, key: &str, value: CachedValue, ttl: Duration) {
        let entry = CacheEntry::new(value, self.clock.now_millis(), ttl);
        let displaced = self.entries.lock().push(key.to_string(), entry);

        if let Some((evicted_key, _)) = displaced {
            if evicted_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(evicted = %evicted_key, "L1 entry evicted");
            }
        }
    }

    /// Remove a key; true when a live entry was removed
    pub fn remove(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        self.entries
            .lock()
            .pop(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove every key matching `pattern`; returns the live keys removed
    pub fn remove_matching(&self, pattern: &Regex) -> Vec<String> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();

        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, _)| pattern.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();

        matching
            .into_iter()
            .filter_map(|key| {
                let entry = entries.pop(&key)?;
                (!entry.is_expired(now)).then_some(key)
            })
            .collect()
    }

    /// Drop expired entries regardless of access; returns how many
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries.lock();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Remove everything; returns the number of entries dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Entries currently held, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
