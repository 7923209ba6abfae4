//! # OpenTelemetry Instruments
//!
//! Counters and histograms exported alongside the in-process collector.
//! Without an installed meter provider every instrument is a no-op, so the
//! library never requires an exporter.
//!
//! ```rust
//! use brixsport_resilience::metrics::instruments::*;
//! use opentelemetry::KeyValue;
//!
//! cache_operations_total().add(
//!     1,
//!     &[
//!         KeyValue::new("operation", "get"),
//!         KeyValue::new("outcome", "hit"),
//!         KeyValue::new("tier", "l1"),
//!     ],
//! );
//! ```

use crate::resilience::CircuitState;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

/// Lazy-initialized meter for resilience metrics
static RESILIENCE_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    RESILIENCE_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("brixsport-resilience"))
}

// ============================================================================
// Counters
// ============================================================================

/// Total cache operations
///
/// Labels:
/// - operation: get, set, delete, clear
/// - outcome: hit, miss, ok, error
/// - tier: l1, l2, none
pub fn cache_operations_total() -> Counter<u64> {
    meter()
        .u64_counter("brixsport.cache.operations.total")
        .with_description("Total number of cache operations")
        .build()
}

/// Circuit breaker state transitions
///
/// Labels:
/// - component: breaker name
/// - from, to: closed, open, half_open
pub fn circuit_breaker_transitions_total() -> Counter<u64> {
    meter()
        .u64_counter("brixsport.circuit_breaker.transitions.total")
        .with_description("Total number of circuit breaker state transitions")
        .build()
}

/// Rate limiter decisions
///
/// Labels:
/// - decision: allowed, rejected, skipped
/// - tier: remote, local, none
pub fn rate_limit_decisions_total() -> Counter<u64> {
    meter()
        .u64_counter("brixsport.rate_limit.decisions.total")
        .with_description("Total number of rate limiter decisions")
        .build()
}

/// Cache warming strategy runs
///
/// Labels:
/// - strategy: strategy name
/// - outcome: success, failure
pub fn warming_runs_total() -> Counter<u64> {
    meter()
        .u64_counter("brixsport.cache_warmer.runs.total")
        .with_description("Total number of cache warming strategy runs")
        .build()
}

// ============================================================================
// Histograms
// ============================================================================

/// Cache operation latency in milliseconds
///
/// Labels:
/// - operation: get, set, delete, clear
pub fn cache_operation_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("brixsport.cache.operation.duration")
        .with_description("Cache operation latency in milliseconds")
        .with_unit("ms")
        .build()
}

// ============================================================================
// Recording helpers
// ============================================================================

pub fn record_cache_operation(
    operation: &'static str,
    outcome: &'static str,
    tier: &'static str,
    duration_ms: f64,
) {
    cache_operations_total().add(
        1,
        &[
            KeyValue::new("operation", operation),
            KeyValue::new("outcome", outcome),
            KeyValue::new("tier", tier),
        ],
    );
    cache_operation_duration().record(duration_ms, &[KeyValue::new("operation", operation)]);
}

pub fn record_breaker_transition(component: &str, from: CircuitState, to: CircuitState) {
    circuit_breaker_transitions_total().add(
        1,
        &[
            KeyValue::new("component", component.to_string()),
            KeyValue::new("from", from.as_str()),
            KeyValue::new("to", to.as_str()),
        ],
    );
}

pub fn record_rate_limit_decision(decision: &'static str, tier: &'static str) {
    rate_limit_decisions_total().add(
        1,
        &[
            KeyValue::new("decision", decision),
            KeyValue::new("tier", tier),
        ],
    );
}

pub fn record_warming_run(strategy: &str, success: bool) {
    warming_runs_total().add(
        1,
        &[
            KeyValue::new("strategy", strategy.to_string()),
            KeyValue::new("outcome", if success { "success" } else { "failure" }),
        ],
    );
}
