//! Fixed-window rate limiter.
//!
//! Counters live in the shared remote store while it is reachable and in an
//! in-process map otherwise. A single request's read-modify-write always runs
//! against one tier: if any remote step fails, the whole evaluation is redone
//! locally. Local and remote counts are never merged, so a flapping remote
//! store can at worst let a client through up to twice its quota for one
//! window.

use super::decision::{RateLimitDecision, RateLimitInfo, RateLimitRecord};
use super::request::{remote_address, ClientRequest, KeyGenerator, SkipPredicate};
use crate::clock::{Clock, SystemClock};
use crate::config::{CircuitBreakerSettings, ConfigResult, RateLimitConfig};
use crate::constants::components;
use crate::logging::log_rate_limit_rejection;
use crate::metrics::instruments;
use crate::resilience::{
    CircuitBreaker, DegradeReason, Degraded, StoreFallback, Tier,
};
use crate::store::{RemoteStore, StoreError};
use crate::utils::PeriodicTask;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decision counters since construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterStats {
    pub admitted: u64,
    pub rejected: u64,
    pub skipped: u64,
    /// Evaluations that fell back to the local map after a remote failure
    pub degraded: u64,
    /// Clients currently tracked in the local map
    pub local_clients: usize,
}

#[derive(Debug, Default)]
struct Counters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    skipped: AtomicU64,
    degraded: AtomicU64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    store: StoreFallback,
    local: DashMap<String, RateLimitRecord>,
    key_generator: KeyGenerator,
    skip: Option<SkipPredicate>,
    clock: Arc<dyn Clock>,
    counters: Counters,
    cleanup: Mutex<Option<PeriodicTask>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("local_clients", &self.local.len())
            .finish()
    }
}

pub struct RateLimiterBuilder {
    config: RateLimitConfig,
    remote: Option<Arc<dyn RemoteStore>>,
    breaker: Option<Arc<CircuitBreaker>>,
    clock: Option<Arc<dyn Clock>>,
    key_generator: Option<KeyGenerator>,
    skip: Option<SkipPredicate>,
}

impl RateLimiterBuilder {
    pub fn remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(store);
        self
    }

    /// Breaker guarding the remote store; a dedicated one is created otherwise
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&ClientRequest) -> Option<String> + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    pub fn skip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ClientRequest) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(predicate));
        self
    }

    pub fn build(self) -> ConfigResult<RateLimiter> {
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        // Same settings the registry resolves for this component
        let breaker = self.breaker.unwrap_or_else(|| {
            let settings = CircuitBreakerSettings::default()
                .config_for_component(components::RATE_LIMITER)
                .to_resilience_config();
            Arc::new(CircuitBreaker::with_clock(
                components::RATE_LIMITER.to_string(),
                settings,
                clock.clone(),
            ))
        });

        info!(
            max_requests = self.config.max_requests,
            window_ms = self.config.window_ms,
            remote = self.remote.as_ref().map(|r| r.provider_name()),
            "Rate limiter initialized"
        );

        Ok(RateLimiter {
            config: self.config,
            store: StoreFallback::new(self.remote, breaker),
            local: DashMap::new(),
            key_generator: self
                .key_generator
                .unwrap_or_else(|| Arc::new(remote_address) as KeyGenerator),
            skip: self.skip,
            clock,
            counters: Counters::default(),
            cleanup: Mutex::new(None),
        })
    }
}

impl RateLimiter {
    pub fn builder(config: RateLimitConfig) -> RateLimiterBuilder {
        RateLimiterBuilder {
            config,
            remote: None,
            breaker: None,
            clock: None,
            key_generator: None,
            skip: None,
        }
    }

    fn record_key(&self, client_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, client_id)
    }

    /// Count `request` against its client's quota and decide whether to admit it.
    ///
    /// Never fails: requests the limiter cannot attribute are admitted uncounted.
    pub async fn check(&self, request: &ClientRequest) -> RateLimitDecision {
        if self.skip.as_ref().is_some_and(|skip| skip(request)) {
            return self.finish_skipped("none");
        }

        let Some(client_id) = (self.key_generator)(request) else {
            warn!(
                method = %request.method,
                path = %request.path,
                "Could not derive rate-limit client id, admitting request"
            );
            return self.finish_skipped("none");
        };

        self.check_client(&client_id).await
    }

    /// Count one request for an already-derived client id
    pub async fn check_client(&self, client_id: &str) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let evaluated = self.evaluate(client_id, now).await;

        if evaluated.tier == Tier::Secondary && self.store.has_remote() {
            self.counters.degraded.fetch_add(1, Ordering::Relaxed);
        }

        let record = evaluated.value;
        let info = RateLimitInfo::from_record(&record, self.config.max_requests);
        let decision = if record.count > self.config.max_requests {
            let retry_after_secs = record.seconds_until_reset(now);
            log_rate_limit_rejection(
                client_id,
                record.count,
                self.config.max_requests,
                retry_after_secs,
            );
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            RateLimitDecision::Rejected {
                info,
                retry_after_secs,
                message: self.config.message.clone(),
            }
        } else {
            self.counters.admitted.fetch_add(1, Ordering::Relaxed);
            RateLimitDecision::Allowed(info)
        };

        let tier = match evaluated.tier {
            Tier::Primary => "remote",
            Tier::Secondary => "local",
        };
        instruments::record_rate_limit_decision(decision.as_label(), tier);
        decision
    }

    async fn evaluate(&self, client_id: &str, now: u64) -> Degraded<RateLimitRecord> {
        let window_ms = self.config.window_ms;
        let key = self.record_key(client_id);

        self.store
            .run(
                |remote| async move {
                    let stored = remote.get(&key).await?;
                    let mut record = stored
                        .and_then(|raw| match serde_json::from_str::<RateLimitRecord>(&raw) {
                            Ok(record) => Some(record),
                            Err(e) => {
                                warn!(key = %key, error = %e, "Discarding unreadable rate-limit record");
                                None
                            }
                        })
                        .unwrap_or_else(|| RateLimitRecord::fresh(now, window_ms));

                    record.register_hit(now, window_ms);
                    let payload = serde_json::to_string(&record)?;
                    remote
                        .set(&key, &payload, record.seconds_until_reset(now))
                        .await?;
                    Ok::<_, StoreError>(record)
                },
                |reason| {
                    if let DegradeReason::PrimaryFailed(error) = &reason {
                        warn!(
                            client_id = client_id,
                            error = %error,
                            "Remote rate-limit store failed, counting locally"
                        );
                    }
                    self.count_locally(client_id, now)
                },
            )
            .await
    }

    fn count_locally(&self, client_id: &str, now: u64) -> RateLimitRecord {
        let window_ms = self.config.window_ms;
        let mut entry = self
            .local
            .entry(client_id.to_string())
            .or_insert_with(|| RateLimitRecord::fresh(now, window_ms));
        entry.register_hit(now, window_ms);
        *entry
    }

    fn finish_skipped(&self, tier: &'static str) -> RateLimitDecision {
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        let decision = RateLimitDecision::Skipped;
        instruments::record_rate_limit_decision(decision.as_label(), tier);
        decision
    }

    /// Forget a client's counters in both tiers, best effort
    pub async fn reset_client(&self, client_id: &str) {
        self.local.remove(client_id);

        let keys = vec![self.record_key(client_id)];
        let cleared = self
            .store
            .run(|remote| async move { remote.delete(&keys).await }, |_| 0)
            .await;
        debug!(
            client_id = client_id,
            remote_removed = cleared.value,
            "Rate-limit counters reset"
        );
    }

    /// Drop local records whose window has closed; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.local.len();
        self.local.retain(|_, record| record.window_reset_at > now);
        let removed = before.saturating_sub(self.local.len());
        if removed > 0 {
            debug!(removed = removed, "Stale local rate-limit records swept");
        }
        removed
    }

    /// Start the periodic local sweep. The task holds a weak reference and
    /// exits once the limiter is dropped.
    pub fn start_cleanup(self: &Arc<Self>, interval: Duration) -> ConfigResult<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = PeriodicTask::spawn("rate_limit_cleanup", interval, false, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(limiter) => {
                        limiter.sweep_expired();
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }
        })?;
        *self.cleanup.lock() = Some(task);
        Ok(())
    }

    pub fn stop_cleanup(&self) {
        if let Some(task) = self.cleanup.lock().take() {
            task.stop();
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            admitted: self.counters.admitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            degraded: self.counters.degraded.load(Ordering::Relaxed),
            local_clients: self.local.len(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.store.breaker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::forwarded_for_or_remote;
    use crate::store::InMemoryStore;

    fn single_request_config() -> RateLimitConfig {
        RateLimitConfig {
            max_requests: 1,
            window_ms: 60_000,
            ..Default::default()
        }
    }

    fn request_from(addr: &str) -> ClientRequest {
        ClientRequest::new("GET", "/api/matches").with_remote_addr(addr)
    }

    #[test]
    fn test_standalone_breaker_matches_registry_settings() {
        let limiter = RateLimiter::builder(single_request_config()).build().unwrap();
        let registry = crate::resilience::CircuitBreakerManager::from_config(
            &CircuitBreakerSettings::default(),
        );

        assert_eq!(limiter.breaker().name(), components::RATE_LIMITER);
        assert_eq!(
            limiter.breaker().config(),
            registry.get_circuit_breaker(components::RATE_LIMITER).config()
        );
    }

    #[tokio::test]
    async fn test_zero_cleanup_interval_is_rejected() {
        let limiter = Arc::new(RateLimiter::builder(single_request_config()).build().unwrap());
        assert!(limiter.start_cleanup(Duration::ZERO).is_err());
        assert!(limiter.start_cleanup(Duration::from_secs(60)).is_ok());
        limiter.stop_cleanup();
    }

    #[tokio::test]
    async fn test_second_request_rejected_other_client_admitted() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let limiter = RateLimiter::builder(single_request_config())
            .clock(clock.clone())
            .build()
            .unwrap();

        let first = limiter.check(&request_from("1.1.1.1")).await;
        assert!(first.is_allowed());
        assert_eq!(first.info().unwrap().remaining, 0);

        let second = limiter.check(&request_from("1.1.1.1")).await;
        match &second {
            RateLimitDecision::Rejected {
                retry_after_secs,
                message,
                ..
            } => {
                assert_eq!(*retry_after_secs, 60);
                assert_eq!(message, "Too many requests, please try again later.");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        assert!(limiter.check(&request_from("2.2.2.2")).await.is_allowed());
    }

    #[tokio::test]
    async fn test_window_elapse_starts_fresh_counter() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let limiter = RateLimiter::builder(single_request_config())
            .remote_store(store)
            .clock(clock.clone())
            .build()
            .unwrap();

        limiter.check_client("fan-42").await;
        assert!(!limiter.check_client("fan-42").await.is_allowed());

        clock.advance(Duration::from_millis(60_001));
        let decision = limiter.check_client("fan-42").await;
        assert!(decision.is_allowed());
        assert_eq!(decision.info().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_remote_counters_shared_between_instances() {
        let clock = Arc::new(ManualClock::new(0));
        let store: Arc<dyn RemoteStore> = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let build = || {
            RateLimiter::builder(RateLimitConfig {
                max_requests: 2,
                ..Default::default()
            })
            .remote_store(store.clone())
            .clock(clock.clone())
            .build()
            .unwrap()
        };
        let a = build();
        let b = build();

        assert!(a.check_client("c").await.is_allowed());
        assert!(b.check_client("c").await.is_allowed());
        assert!(!a.check_client("c").await.is_allowed());
        assert_eq!(
            store.get("ratelimit:c").await.unwrap().map(|raw| {
                serde_json::from_str::<RateLimitRecord>(&raw).unwrap().count
            }),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_remote_outage_falls_back_to_local_counting() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        store.set_available(false);
        let limiter = RateLimiter::builder(single_request_config())
            .remote_store(store.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        assert!(limiter.check_client("c").await.is_allowed());
        assert!(!limiter.check_client("c").await.is_allowed());

        let stats = limiter.stats();
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.degraded, 2);
        assert_eq!(stats.local_clients, 1);
    }

    #[tokio::test]
    async fn test_unreadable_remote_record_is_replaced() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        store.set("ratelimit:c", "not json", 60).await.unwrap();
        let limiter = RateLimiter::builder(single_request_config())
            .remote_store(store.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        let decision = limiter.check_client("c").await;
        assert!(decision.is_allowed());
        assert_eq!(limiter.stats().degraded, 0);
    }

    #[tokio::test]
    async fn test_skip_and_unattributable_requests() {
        let limiter = RateLimiter::builder(single_request_config())
            .skip(|request| request.path.starts_with("/health"))
            .key_generator(forwarded_for_or_remote)
            .build()
            .unwrap();

        for _ in 0..3 {
            let decision = limiter
                .check(&ClientRequest::new("GET", "/health").with_remote_addr("1.1.1.1"))
                .await;
            assert_eq!(decision, RateLimitDecision::Skipped);
        }
        assert_eq!(
            limiter.check(&ClientRequest::new("GET", "/api")).await,
            RateLimitDecision::Skipped
        );

        let proxied = ClientRequest::new("GET", "/api")
            .with_remote_addr("10.0.0.1")
            .with_header("X-Forwarded-For", "203.0.113.5");
        assert!(limiter.check(&proxied).await.is_allowed());
        assert!(!limiter.check_client("203.0.113.5").await.is_allowed());
        assert_eq!(limiter.stats().skipped, 4);
    }

    #[tokio::test]
    async fn test_reset_client_and_sweep() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::builder(single_request_config())
            .clock(clock.clone())
            .build()
            .unwrap();

        limiter.check_client("a").await;
        limiter.check_client("b").await;
        assert!(!limiter.check_client("a").await.is_allowed());

        limiter.reset_client("a").await;
        assert!(limiter.check_client("a").await.is_allowed());

        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.sweep_expired(), 2);
        assert_eq!(limiter.stats().local_clients, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = RateLimiter::builder(RateLimitConfig {
            max_requests: 0,
            ..Default::default()
        })
        .build();
        assert!(result.is_err());
    }
}
