//! # Circuit Breaker Metrics
//!
//! Snapshots of circuit breaker counters for health endpoints, logging and
//! aggregation across the registry.

use crate::resilience::CircuitState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Total number of calls attempted, including rejected ones
    pub total_requests: u64,

    /// Calls short-circuited while the breaker was open
    pub rejected_requests: u64,

    /// Number of successful calls
    pub success_count: u64,

    /// Number of failed calls that counted toward tripping
    pub failure_count: u64,

    /// Failed calls the error filter chose to ignore
    pub ignored_failures: u64,

    pub consecutive_failures: u64,

    pub consecutive_successes: u64,

    /// Failures still inside the monitoring window
    pub recent_failures: usize,

    /// Total duration of all executed operations
    pub total_duration: Duration,

    /// Current circuit breaker state
    pub current_state: CircuitState,

    /// Epoch millis after which an open circuit admits a probe
    pub next_attempt_at: Option<u64>,

    /// Epoch millis of the last state transition
    pub last_state_change: u64,

    /// Calculated failure rate over executed calls (0.0 to 1.0)
    pub failure_rate: f64,

    /// Calculated success rate over executed calls (0.0 to 1.0)
    pub success_rate: f64,

    /// Average operation duration
    pub average_duration: Duration,
}

impl CircuitBreakerMetrics {
    /// Create new metrics instance with zero values
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            rejected_requests: 0,
            success_count: 0,
            failure_count: 0,
            ignored_failures: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            recent_failures: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
            next_attempt_at: None,
            last_state_change: 0,
            failure_rate: 0.0,
            success_rate: 0.0,
            average_duration: Duration::ZERO,
        }
    }

    /// Check if metrics indicate healthy operation
    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate < 0.1,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    /// Get human-readable state description
    pub fn state_description(&self) -> &'static str {
        match self.current_state {
            CircuitState::Closed => "Healthy - Normal operation",
            CircuitState::Open => "Failing - Rejecting all calls",
            CircuitState::HalfOpen => "Recovering - Testing system health",
        }
    }

    /// Format metrics for logging
    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Requests: {} | Rejected: {} | Success: {:.1}% | Failures: {} | Avg Duration: {}ms",
            self.state_description(),
            self.total_requests,
            self.rejected_requests,
            self.success_rate * 100.0,
            self.failure_count,
            self.average_duration.as_millis()
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// System-wide circuit breaker metrics aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    /// Metrics for individual circuit breakers by name
    pub circuit_breakers: HashMap<String, CircuitBreakerMetrics>,

    /// Epoch millis of the collection
    pub collected_at: u64,
}

impl SystemCircuitBreakerMetrics {
    pub fn new(collected_at: u64) -> Self {
        Self {
            circuit_breakers: HashMap::new(),
            collected_at,
        }
    }

    pub fn add_circuit_breaker(&mut self, name: String, metrics: CircuitBreakerMetrics) {
        self.circuit_breakers.insert(name, metrics);
    }

    /// Get count of circuit breakers by state
    pub fn count_by_state(&self) -> HashMap<CircuitState, usize> {
        let mut counts = HashMap::new();
        for metrics in self.circuit_breakers.values() {
            *counts.entry(metrics.current_state).or_insert(0) += 1;
        }
        counts
    }

    /// Get list of unhealthy circuit breakers
    pub fn unhealthy_circuits(&self) -> Vec<(&String, &CircuitBreakerMetrics)> {
        self.circuit_breakers
            .iter()
            .filter(|(_, metrics)| !metrics.is_healthy())
            .collect()
    }

    /// Calculate system-wide health score (0.0 to 1.0)
    pub fn health_score(&self) -> f64 {
        if self.circuit_breakers.is_empty() {
            return 1.0;
        }

        let healthy_count = self
            .circuit_breakers
            .values()
            .filter(|metrics| metrics.is_healthy())
            .count();

        healthy_count as f64 / self.circuit_breakers.len() as f64
    }

    pub fn total_requests(&self) -> u64 {
        self.circuit_breakers
            .values()
            .map(|metrics| metrics.total_requests)
            .sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.circuit_breakers
            .values()
            .map(|metrics| metrics.failure_count)
            .sum()
    }

    /// Failures over executed (non-rejected) calls across every breaker
    pub fn system_failure_rate(&self) -> f64 {
        let executed: u64 = self
            .circuit_breakers
            .values()
            .map(|metrics| metrics.success_count + metrics.failure_count)
            .sum();
        if executed == 0 {
            return 0.0;
        }

        self.total_failures() as f64 / executed as f64
    }

    /// Format summary for logging
    pub fn format_summary(&self) -> String {
        let state_counts = self.count_by_state();
        let closed_count = state_counts.get(&CircuitState::Closed).unwrap_or(&0);
        let open_count = state_counts.get(&CircuitState::Open).unwrap_or(&0);
        let half_open_count = state_counts.get(&CircuitState::HalfOpen).unwrap_or(&0);

        format!(
            "Circuit Breakers: {} total | {} closed | {} open | {} half-open | Health: {:.1}% | System failure rate: {:.2}%",
            self.circuit_breakers.len(),
            closed_count,
            open_count,
            half_open_count,
            self.health_score() * 100.0,
            self.system_failure_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_metrics_creation() {
        let metrics = CircuitBreakerMetrics::new();

        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.success_count, 0);
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.current_state, CircuitState::Closed);
        assert!(metrics.is_healthy());
    }

    #[test]
    fn test_system_metrics_aggregation() {
        let mut system_metrics = SystemCircuitBreakerMetrics::new(0);

        let mut cache_metrics = CircuitBreakerMetrics::new();
        cache_metrics.total_requests = 100;
        cache_metrics.success_count = 95;
        cache_metrics.failure_count = 5;
        cache_metrics.failure_rate = 0.05;

        let mut limiter_metrics = CircuitBreakerMetrics::new();
        limiter_metrics.current_state = CircuitState::Open;
        limiter_metrics.total_requests = 60;
        limiter_metrics.rejected_requests = 10;
        limiter_metrics.success_count = 25;
        limiter_metrics.failure_count = 25;
        limiter_metrics.failure_rate = 0.5;

        system_metrics.add_circuit_breaker("cache".to_string(), cache_metrics);
        system_metrics.add_circuit_breaker("rate_limiter".to_string(), limiter_metrics);

        assert_eq!(system_metrics.total_requests(), 160);
        assert_eq!(system_metrics.total_failures(), 30);
        assert_eq!(system_metrics.system_failure_rate(), 0.2);

        let state_counts = system_metrics.count_by_state();
        assert_eq!(state_counts.get(&CircuitState::Closed), Some(&1));
        assert_eq!(state_counts.get(&CircuitState::Open), Some(&1));

        assert_eq!(system_metrics.health_score(), 0.5);

        let unhealthy = system_metrics.unhealthy_circuits();
        assert_eq!(unhealthy.len(), 1);
        assert_eq!(unhealthy[0].0, "rate_limiter");
        assert!(system_metrics.format_summary().contains("1 open"));
    }

    #[test]
    fn test_metrics_health_calculation() {
        let mut metrics = CircuitBreakerMetrics::new();

        metrics.failure_rate = 0.05;
        assert!(metrics.is_healthy());

        metrics.failure_rate = 0.15;
        assert!(!metrics.is_healthy());

        metrics.current_state = CircuitState::Open;
        metrics.failure_rate = 0.0;
        assert!(!metrics.is_healthy());

        metrics.current_state = CircuitState::HalfOpen;
        assert!(metrics.is_healthy());
    }
}
