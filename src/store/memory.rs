//! In-memory remote store
//!
//! Implements the full `RemoteStore` contract on a `DashMap` with per-key
//! expiry. Useful for single-instance deployments and as a controllable stand-in
//! for Redis in tests: `set_available(false)` makes every call fail with a
//! connection error so degrade paths can be exercised.
//!
//! Expired entries are dropped when read, on every `keys`/`ping` call and every
//! [`PURGE_EVERY_WRITES`] writes, so the map stays bounded by live keys.
//!
//! **Important**: This store is NOT shared between processes.

use super::errors::{StoreError, StoreResult};
use super::pattern::glob_to_regex;
use super::traits::RemoteStore;
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Writes between opportunistic purges of expired entries
pub const PURGE_EVERY_WRITES: u64 = 1024;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: u64,
}

/// `DashMap`-backed store with clock-driven expiry
#[derive(Debug)]
pub struct InMemoryStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    calls: AtomicU64,
    writes: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            available: AtomicBool::new(true),
            calls: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        debug!(available = available, "In-memory store availability changed");
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of store calls attempted (including failed ones)
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of live (unexpired) keys
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged = purged, "Expired in-memory store entries purged");
        }
        purged
    }

    fn check_available(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::ConnectionError(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        let now = self.clock.now_millis();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, stored| stored.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        self.check_available()?;
        let now = self.clock.now_millis();
        let ttl_millis = ttl_seconds.max(1).saturating_mul(1_000);

        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: now.saturating_add(ttl_millis),
            },
        );

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % PURGE_EVERY_WRITES == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<u64> {
        self.check_available()?;
        let now = self.clock.now_millis();

        let removed = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .filter(|(_, stored)| stored.expires_at > now)
            .count();
        Ok(removed as u64)
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let matcher = glob_to_regex(pattern)
            .map_err(|e| StoreError::BackendError(format!("invalid key pattern: {e}")))?;
        self.purge_expired();
        let now = self.clock.now_millis();

        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.expires_at > now && matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()?;
        self.purge_expired();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn store_with_clock() -> (InMemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        (InMemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get_and_expiry() {
        let (store, clock) = store_with_clock();
        store.set("match:1", "live", 2).await.unwrap();
        assert_eq!(store.get("match:1").await.unwrap(), Some("live".to_string()));

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.get("match:1").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_keys_uses_glob() {
        let (store, _) = store_with_clock();
        store.set("user:1", "a", 60).await.unwrap();
        store.set("user:2", "b", 60).await.unwrap();
        store.set("team:1", "c", 60).await.unwrap();

        let mut keys = store.keys("user:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys_only() {
        let (store, _) = store_with_clock();
        store.set("a", "1", 60).await.unwrap();
        store.set("b", "2", 60).await.unwrap();

        let removed = store
            .delete(&["a".to_string(), "b".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let (store, _) = store_with_clock();
        store.set_available(false);

        assert!(matches!(
            store.get("k").await,
            Err(StoreError::ConnectionError(_))
        ));
        assert!(store.set("k", "v", 1).await.is_err());
        assert!(store.ping().await.is_err());
        assert_eq!(store.call_count(), 3);

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_entries_are_freed_by_scans() {
        let (store, clock) = store_with_clock();
        for i in 0..500 {
            store.set(&format!("ratelimit:10.0.0.{i}"), "{}", 1).await.unwrap();
        }
        store.set("standings", "[]", 3600).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.entries.len(), 501);

        assert_eq!(store.keys("*").await.unwrap(), vec!["standings".to_string()]);
        assert_eq!(store.entries.len(), 1);

        store.set("match:1", "live", 1).await.unwrap();
        clock.advance(Duration::from_secs(5));
        store.ping().await.unwrap();
        assert_eq!(store.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_alone_keep_the_map_bounded() {
        let (store, clock) = store_with_clock();
        for round in 0..4u64 {
            for i in 0..PURGE_EVERY_WRITES {
                store
                    .set(&format!("ratelimit:{round}:{i}"), "{}", 1)
                    .await
                    .unwrap();
            }
            clock.advance(Duration::from_secs(2));
        }

        // Each purge drops the previous round's expired counters
        let retained = store.entries.len();
        assert!(retained <= 2 * PURGE_EVERY_WRITES as usize);
        assert_eq!(store.purge_expired(), retained);
        assert!(store.entries.is_empty());
    }
}
