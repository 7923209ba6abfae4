//! Shared fixtures: a fully wired context over a controllable in-memory store
//! and a manual clock.

use brixsport_resilience::config::{CircuitBreakerComponentConfig, ResilienceConfig};
use brixsport_resilience::constants::components;
use brixsport_resilience::{InMemoryStore, ManualClock, ResilienceContext};
use std::sync::Arc;

/// Start time for every test clock (2024-01-01T00:00:00Z)
pub const TEST_EPOCH_MS: u64 = 1_704_067_200_000;

pub struct TestHarness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub context: ResilienceContext,
}

/// Breaker that trips after two failures with no volume requirement
pub fn fast_breaker() -> CircuitBreakerComponentConfig {
    CircuitBreakerComponentConfig {
        failure_threshold: 2,
        success_threshold: 1,
        timeout_ms: 5_000,
        monitoring_period_ms: 60_000,
        volume_threshold: 0,
    }
}

/// Default configuration with fast-tripping breakers for both components
pub fn test_config() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    for name in [components::REMOTE_CACHE, components::RATE_LIMITER] {
        config
            .circuit_breakers
            .components
            .insert(name.to_string(), fast_breaker());
    }
    config
}

pub fn harness_with(config: ResilienceConfig) -> TestHarness {
    let clock = Arc::new(ManualClock::new(TEST_EPOCH_MS));
    let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let context = ResilienceContext::builder(config)
        .remote_store(store.clone())
        .clock(clock.clone())
        .build()
        .expect("test configuration is valid");

    TestHarness {
        clock,
        store,
        context,
    }
}

pub fn harness() -> TestHarness {
    harness_with(test_config())
}
