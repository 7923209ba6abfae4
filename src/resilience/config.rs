//! # Circuit Breaker Configuration
//!
//! Runtime configuration for a single circuit breaker. File-based settings
//! (milliseconds, per-component overrides) live in
//! `crate::config::CircuitBreakerSettings` and convert into this type.

use crate::config::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures within `monitoring_period` needed to open the circuit
    pub failure_threshold: u32,

    /// Consecutive successes in half-open state needed to close the circuit
    pub success_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub timeout: Duration,

    /// Sliding window over which failures are counted
    pub monitoring_period: Duration,

    /// Minimum number of requests before the circuit may trip
    pub volume_threshold: u64,
}

impl CircuitBreakerConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::invalid(
                "failure_threshold",
                "must be greater than 0",
            ));
        }

        if self.success_threshold == 0 {
            return Err(ConfigurationError::invalid(
                "success_threshold",
                "must be greater than 0",
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigurationError::invalid("timeout", "must be greater than 0"));
        }

        if self.monitoring_period.is_zero() {
            return Err(ConfigurationError::invalid(
                "monitoring_period",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            monitoring_period: Duration::from_secs(120),
            volume_threshold: 10,
        }
    }
}
