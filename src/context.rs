//! # Resilience Context
//!
//! Builds every component once, wires them together and owns their
//! background tasks. Request handlers receive the context (or the `Arc`s it
//! hands out) instead of reaching for process-wide globals, so each test can
//! build an isolated instance.

use crate::cache::TwoTierCache;
use crate::clock::{Clock, SystemClock};
use crate::config::ResilienceConfig;
use crate::constants::components;
use crate::error::ResilienceResult;
use crate::metrics::{CacheHealth, CacheMetricsCollector};
use crate::rate_limit::RateLimiter;
use crate::resilience::CircuitBreakerManager;
use crate::store::RemoteStore;
use crate::warmer::CacheWarmer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Combined health view of the context's components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextHealth {
    pub instance_id: Uuid,
    pub healthy: bool,
    pub remote_reachable: bool,
    pub circuit_breaker_health_score: f64,
    pub cache: CacheHealth,
}

pub struct ResilienceContextBuilder {
    config: ResilienceConfig,
    remote_store: Option<Arc<dyn RemoteStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ResilienceContextBuilder {
    /// Shared store used as L2 and for rate-limit counters
    pub fn remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and construct every component
    pub fn build(self) -> ResilienceResult<ResilienceContext> {
        let config = self.config;
        config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let instance_id = Uuid::new_v4();

        let breakers = Arc::new(CircuitBreakerManager::with_clock(
            &config.circuit_breakers,
            clock.clone(),
        ));
        let metrics = Arc::new(CacheMetricsCollector::new(
            config.metrics.clone(),
            clock.clone(),
        ));

        let cache = Arc::new(TwoTierCache::new(
            config.cache.clone(),
            self.remote_store.clone(),
            breakers.get_circuit_breaker(components::REMOTE_CACHE),
            Arc::clone(&metrics),
            clock.clone(),
        )?);

        let mut limiter = RateLimiter::builder(config.rate_limit.clone())
            .breaker(breakers.get_circuit_breaker(components::RATE_LIMITER))
            .clock(clock.clone());
        if let Some(store) = &self.remote_store {
            limiter = limiter.remote_store(Arc::clone(store));
        }
        let rate_limiter = Arc::new(limiter.build()?);

        let warmer = Arc::new(CacheWarmer::new(Arc::clone(&cache), clock.clone()));

        info!(
            instance_id = %instance_id,
            remote = self.remote_store.as_ref().map(|s| s.provider_name()),
            "✅ Resilience context initialized"
        );

        Ok(ResilienceContext {
            instance_id,
            config,
            clock,
            breakers,
            metrics,
            cache,
            rate_limiter,
            warmer,
        })
    }
}

#[derive(Debug)]
pub struct ResilienceContext {
    instance_id: Uuid,
    config: ResilienceConfig,
    clock: Arc<dyn Clock>,
    breakers: Arc<CircuitBreakerManager>,
    metrics: Arc<CacheMetricsCollector>,
    cache: Arc<TwoTierCache>,
    rate_limiter: Arc<RateLimiter>,
    warmer: Arc<CacheWarmer>,
}

impl ResilienceContext {
    pub fn builder(config: ResilienceConfig) -> ResilienceContextBuilder {
        ResilienceContextBuilder {
            config,
            remote_store: None,
            clock: None,
        }
    }

    /// Start the L1 expiry sweep, the rate-limit cleanup and, when
    /// `warmer.auto_warm` is set, auto-warming. Must run inside a tokio runtime.
    pub fn start_background_tasks(&self) -> ResilienceResult<()> {
        self.cache
            .start_expiry_sweeper(self.config.cache.sweep_interval())?;
        self.rate_limiter.start_cleanup(std::time::Duration::from_secs(
            self.config.rate_limit.cleanup_interval_seconds,
        ))?;
        if self.config.warmer.auto_warm {
            self.warmer.start_auto_warming(self.config.warmer.interval())?;
        }

        info!(
            instance_id = %self.instance_id,
            auto_warm = self.config.warmer.auto_warm,
            "Background tasks started"
        );
        Ok(())
    }

    /// Stop every background task started by [`Self::start_background_tasks`]
    pub fn shutdown(&self) {
        self.warmer.stop_auto_warming();
        self.rate_limiter.stop_cleanup();
        self.cache.stop_expiry_sweeper();
        info!(instance_id = %self.instance_id, "🛑 Resilience context shut down");
    }

    pub async fn health(&self) -> ContextHealth {
        let cache = self.metrics.get_health();
        let remote_reachable = self.cache.health_check().await;
        let circuit_breaker_health_score = self.breakers.system_health_score();

        ContextHealth {
            instance_id: self.instance_id,
            healthy: cache.healthy && remote_reachable,
            remote_reachable,
            circuit_breaker_health_score,
            cache,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    pub fn metrics(&self) -> &Arc<CacheMetricsCollector> {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<TwoTierCache> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn warmer(&self) -> &Arc<CacheWarmer> {
        &self.warmer
    }
}
