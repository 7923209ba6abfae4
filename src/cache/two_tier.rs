//! # Two-Tier Cache
//!
//! A bounded local LRU (L1) in front of a shared remote store (L2). Every L2
//! call goes through the remote-cache circuit breaker via [`StoreFallback`],
//! so a failing or unreachable remote store turns the cache into an L1-only
//! cache instead of an error source. Public operations never return remote or
//! breaker errors; they are counted in the metrics collector instead.
//!
//! Concurrent writers to the same key may briefly leave L1 and L2 with
//! different values. Both tiers expire entries, which bounds the divergence.

use super::entry::CachedValue;
use super::local::LocalCache;
use crate::clock::{duration_millis, Clock};
use crate::config::{CacheConfig, ConfigResult, ConfigurationError};
use crate::error::{ResilienceError, ResilienceResult};
use crate::logging::log_cache_operation;
use crate::metrics::{instruments, CacheMetricsCollector, ErrorKind, OperationKind};
use crate::resilience::{CircuitBreaker, CircuitState, DegradeReason, StoreFallback, Tier};
use crate::store::{glob_to_regex, RemoteStore, StoreError};
use crate::utils::PeriodicTask;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Point-in-time view of the cache tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_enabled: bool,
    pub l1_entries: usize,
    pub l1_capacity: usize,
    pub l1_evictions: u64,
    pub remote_configured: bool,
    pub remote_provider: Option<String>,
    pub breaker_state: CircuitState,
}

pub struct TwoTierCache {
    config: CacheConfig,
    local: Option<LocalCache>,
    remote: StoreFallback,
    metrics: Arc<CacheMetricsCollector>,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl std::fmt::Debug for TwoTierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierCache")
            .field("key_prefix", &self.config.key_prefix)
            .field("l1_enabled", &self.local.is_some())
            .field("remote", &self.remote.remote().map(|r| r.provider_name()))
            .finish()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl TwoTierCache {
    /// Build a cache. Fails when `config` is invalid.
    pub fn new(
        config: CacheConfig,
        remote: Option<Arc<dyn RemoteStore>>,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<CacheMetricsCollector>,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let local = if config.l1_enabled {
            let max_size = NonZeroUsize::new(config.l1_max_size).ok_or_else(|| {
                ConfigurationError::invalid("cache.l1_max_size", "must be greater than 0")
            })?;
            Some(LocalCache::new(max_size, clock))
        } else {
            None
        };

        info!(
            l1_enabled = config.l1_enabled,
            l1_max_size = config.l1_max_size,
            remote = remote.as_ref().map(|r| r.provider_name()),
            key_prefix = %config.key_prefix,
            "Two-tier cache initialized"
        );

        Ok(Self {
            config,
            local,
            remote: StoreFallback::new(remote, breaker),
            metrics,
            sweeper: Mutex::new(None),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn l2_ttl_seconds(&self, ttl: Option<Duration>) -> u64 {
        ttl.map(|ttl| duration_millis(ttl).div_ceil(1000).max(1))
            .unwrap_or(self.config.l2_ttl_seconds)
    }

    /// Count a failed remote call. A skipped call (no remote, open circuit)
    /// is not an error.
    fn record_degrade(
        &self,
        operation: OperationKind,
        key: &str,
        reason: &DegradeReason,
        start: Instant,
    ) {
        if let DegradeReason::PrimaryFailed(message) = reason {
            self.metrics.record_error(
                operation,
                key,
                ErrorKind::RemoteStore,
                message.clone(),
                elapsed_ms(start),
            );
        }
    }

    /// Look up `key`, trying L1 then L2. Remote failures read as a miss.
    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        let start = Instant::now();
        let full_key = self.full_key(key);

        if let Some(value) = self.local.as_ref().and_then(|local| local.get(&full_key)) {
            self.finish_get(key, "hit", "l1", start);
            return Some(value);
        }

        if !self.remote.has_remote() {
            self.finish_get(key, "miss", "none", start);
            return None;
        }

        let lookup_key = full_key.clone();
        let fetched = self
            .remote
            .run(
                |remote| async move { remote.get(&lookup_key).await },
                |reason| {
                    self.record_degrade(OperationKind::Get, key, &reason, start);
                    None
                },
            )
            .await;

        match fetched.value {
            Some(wire) => {
                let value = CachedValue::from_wire(&wire);
                if let Some(local) = &self.local {
                    local.insert(
                        &full_key,
                        value.clone(),
                        Duration::from_secs(self.config.l2_ttl_seconds),
                    );
                }
                self.finish_get(key, "hit", "l2", start);
                Some(value)
            }
            None => {
                self.finish_get(key, "miss", fetched.tier.as_str(), start);
                None
            }
        }
    }

    fn finish_get(&self, key: &str, outcome: &'static str, tier: &'static str, start: Instant) {
        let duration_ms = elapsed_ms(start);
        if outcome == "hit" {
            self.metrics.record_hit(key, duration_ms);
        } else {
            self.metrics.record_miss(key, duration_ms);
        }
        instruments::record_cache_operation("get", outcome, tier, duration_ms);
        log_cache_operation("get", key, outcome, Some(tier), duration_ms);
    }

    /// Store `value` in both tiers.
    ///
    /// `ttl` overrides the L1 default (`l1_ttl_ms`) and the L2 default
    /// (`l2_ttl_seconds`, rounded up to whole seconds). Returns true when the
    /// value landed in L1, or, with L1 disabled, when the L2 write succeeded.
    pub async fn set(&self, key: &str, value: CachedValue, ttl: Option<Duration>) -> bool {
        let start = Instant::now();
        let full_key = self.full_key(key);

        if let Some(local) = &self.local {
            local.insert(&full_key, value.clone(), ttl.unwrap_or(self.config.l1_ttl()));
        }

        let stored_remotely = if self.remote.has_remote() {
            let ttl_seconds = self.l2_ttl_seconds(ttl);
            let wire = value.to_wire();
            let written = self
                .remote
                .run(
                    |remote| async move { remote.set(&full_key, &wire, ttl_seconds).await },
                    |reason| self.record_degrade(OperationKind::Set, key, &reason, start),
                )
                .await;
            written.tier == Tier::Primary
        } else {
            false
        };

        let duration_ms = elapsed_ms(start);
        self.metrics.record_set(key, duration_ms);
        let tier = if stored_remotely { "l2" } else { "l1" };
        instruments::record_cache_operation("set", "ok", tier, duration_ms);

        self.local.is_some() || stored_remotely
    }

    /// Store text as-is
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        self.set(key, CachedValue::raw(value), ttl).await
    }

    /// Store a JSON-serialized value
    pub async fn set_json<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> ResilienceResult<bool> {
        let value = CachedValue::json(value)?;
        Ok(self.set(key, value, ttl).await)
    }

    /// Look up and decode a value
    pub async fn get_json<V: DeserializeOwned>(&self, key: &str) -> ResilienceResult<Option<V>> {
        match self.get(key).await {
            Some(value) => Ok(Some(value.decode()?)),
            None => Ok(None),
        }
    }

    /// Cache-aside: return the cached value or compute, store and return it.
    ///
    /// A cached value that no longer decodes as `V` is treated as a miss.
    pub async fn get_or_set<V, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> ResilienceResult<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        if let Some(cached) = self.get(key).await {
            match cached.decode::<V>() {
                Ok(value) => return Ok(value),
                Err(e) => warn!(key = key, error = %e, "Cached value failed to decode, reloading"),
            }
        }

        let value = loader().await.map_err(ResilienceError::Loader)?;
        self.set_json(key, &value, ttl).await?;
        Ok(value)
    }

    /// Whether `key` is cached in either tier
    pub async fn exists(&self, key: &str) -> bool {
        let full_key = self.full_key(key);
        if self
            .local
            .as_ref()
            .is_some_and(|local| local.contains(&full_key))
        {
            return true;
        }

        self.remote
            .run(
                |remote| async move { Ok::<_, StoreError>(remote.get(&full_key).await?.is_some()) },
                |_| false,
            )
            .await
            .value
    }

    /// Remove `key` from both tiers; returns 1 if either tier held it
    pub async fn delete(&self, key: &str) -> u64 {
        let start = Instant::now();
        let full_key = self.full_key(key);

        let removed_local = self
            .local
            .as_ref()
            .is_some_and(|local| local.remove(&full_key));

        let removed_remote = if self.remote.has_remote() {
            let keys = vec![full_key];
            self.remote
                .run(
                    |remote| async move { remote.delete(&keys).await },
                    |reason| {
                        self.record_degrade(OperationKind::Delete, key, &reason, start);
                        0
                    },
                )
                .await
                .value
        } else {
            0
        };

        let duration_ms = elapsed_ms(start);
        self.metrics.record_delete(key, duration_ms);
        instruments::record_cache_operation("delete", "ok", "none", duration_ms);

        u64::from(removed_local || removed_remote > 0)
    }

    /// Remove every key matching `pattern` (`*`, `?`) from both tiers.
    ///
    /// Returns the number of distinct keys removed across the tiers.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let start = Instant::now();
        let full_pattern = self.full_key(pattern);
        let mut removed: HashSet<String> = HashSet::new();

        if let Some(local) = &self.local {
            match glob_to_regex(&full_pattern) {
                Ok(matcher) => removed.extend(local.remove_matching(&matcher)),
                Err(e) => warn!(pattern = pattern, error = %e, "Invalid key pattern for L1"),
            }
        }

        if self.remote.has_remote() {
            let scan_pattern = full_pattern.clone();
            let remote_keys = self
                .remote
                .run(
                    |remote| async move {
                        let keys = remote.keys(&scan_pattern).await?;
                        if !keys.is_empty() {
                            remote.delete(&keys).await?;
                        }
                        Ok::<_, StoreError>(keys)
                    },
                    |reason| {
                        self.record_degrade(OperationKind::Delete, pattern, &reason, start);
                        Vec::new()
                    },
                )
                .await
                .value;
            removed.extend(remote_keys);
        }

        let duration_ms = elapsed_ms(start);
        self.metrics.record_delete(pattern, duration_ms);
        instruments::record_cache_operation("delete", "ok", "none", duration_ms);
        debug!(pattern = pattern, removed = removed.len(), "Pattern delete complete");

        removed.len() as u64
    }

    /// Empty L1 and, best effort, every prefixed key in L2
    pub async fn clear(&self) {
        let start = Instant::now();
        let cleared_local = self.local.as_ref().map_or(0, LocalCache::clear);

        let mut cleared_remote = 0;
        if self.remote.has_remote() {
            let scan_pattern = self.full_key("*");
            cleared_remote = self
                .remote
                .run(
                    |remote| async move {
                        let keys = remote.keys(&scan_pattern).await?;
                        if keys.is_empty() {
                            return Ok(0);
                        }
                        remote.delete(&keys).await
                    },
                    |reason| {
                        warn!(reason = %reason, "Remote clear skipped");
                        self.record_degrade(OperationKind::Clear, "*", &reason, start);
                        0
                    },
                )
                .await
                .value;
        }

        let duration_ms = elapsed_ms(start);
        self.metrics.record_clear(duration_ms);
        instruments::record_cache_operation("clear", "ok", "none", duration_ms);
        info!(
            cleared_local = cleared_local,
            cleared_remote = cleared_remote,
            "Cache cleared"
        );
    }

    /// Remote `ping` through the breaker; without a remote, healthy when L1 is on
    pub async fn health_check(&self) -> bool {
        if !self.remote.has_remote() {
            return self.local.is_some();
        }

        self.remote
            .run(|remote| async move { remote.ping().await }, |_| ())
            .await
            .tier
            == Tier::Primary
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_enabled: self.local.is_some(),
            l1_entries: self.local.as_ref().map_or(0, LocalCache::len),
            l1_capacity: self.local.as_ref().map_or(0, LocalCache::capacity),
            l1_evictions: self.local.as_ref().map_or(0, LocalCache::evictions),
            remote_configured: self.remote.has_remote(),
            remote_provider: self
                .remote
                .remote()
                .map(|remote| remote.provider_name().to_string()),
            breaker_state: self.remote.breaker().state(),
        }
    }

    /// Drop expired L1 entries now; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let purged = self.local.as_ref().map_or(0, LocalCache::purge_expired);
        if purged > 0 {
            debug!(purged = purged, "Expired L1 entries purged");
        }
        purged
    }

    /// Start the background sweep of expired L1 entries.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped. Calling this again replaces the running sweeper.
    pub fn start_expiry_sweeper(self: &Arc<Self>, interval: Duration) -> ConfigResult<()> {
        if self.local.is_none() {
            return Ok(());
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let task = PeriodicTask::spawn("l1_expiry_sweeper", interval, false, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }
        })?;

        *self.sweeper.lock() = Some(task);
        Ok(())
    }

    pub fn stop_expiry_sweeper(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.stop();
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    pub fn metrics(&self) -> &Arc<CacheMetricsCollector> {
        &self.metrics
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
