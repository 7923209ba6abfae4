//! # Configuration
//!
//! Serde-backed settings for every component of the resilience layer, grouped
//! by section:
//!
//! ```toml
//! [cache]
//! l1_enabled = true
//! l1_max_size = 1000
//! l1_ttl_ms = 300000
//! l2_ttl_seconds = 3600
//! key_prefix = "brixsport:"
//!
//! [circuit_breakers.default]
//! failure_threshold = 5
//!
//! [circuit_breakers.components.remote_cache]
//! failure_threshold = 3
//! timeout_ms = 30000
//!
//! [rate_limit]
//! max_requests = 100
//! window_ms = 60000
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration. See
//! [`ConfigLoader`] for how sources are layered.

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration for the resilience layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub cache: CacheConfig,
    pub circuit_breakers: CircuitBreakerSettings,
    pub rate_limit: RateLimitConfig,
    pub metrics: MetricsConfig,
    pub warmer: WarmerConfig,
    pub logging: LoggingConfig,
}

impl ResilienceConfig {
    /// Validate every section, failing on the first invalid value
    pub fn validate(&self) -> ConfigResult<()> {
        self.cache.validate()?;
        self.circuit_breakers.validate()?;
        self.rate_limit.validate()?;
        self.metrics.validate()?;
        self.warmer.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Two-tier cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Toggles the local tier
    pub l1_enabled: bool,
    /// Maximum number of local entries before eviction
    pub l1_max_size: usize,
    /// Default local entry lifetime in milliseconds
    pub l1_ttl_ms: u64,
    /// Default remote entry lifetime in seconds
    pub l2_ttl_seconds: u64,
    /// Namespace prefix applied to every key
    pub key_prefix: String,
    /// Interval of the background sweep removing expired local entries
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_enabled: true,
            l1_max_size: 1000,
            l1_ttl_ms: 300_000,
            l2_ttl_seconds: 3600,
            key_prefix: "brixsport:".to_string(),
            sweep_interval_seconds: crate::constants::DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn l1_ttl(&self) -> Duration {
        Duration::from_millis(self.l1_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.l1_max_size == 0 {
            return Err(ConfigurationError::invalid(
                "cache.l1_max_size",
                "must be greater than 0",
            ));
        }
        if self.l1_ttl_ms == 0 {
            return Err(ConfigurationError::invalid(
                "cache.l1_ttl_ms",
                "must be greater than 0",
            ));
        }
        if self.l2_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "cache.l2_ttl_seconds",
                "must be greater than 0",
            ));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "cache.sweep_interval_seconds",
                "must be greater than 0",
            ));
        }
        // The prefix is prepended to scan patterns, so it must stay literal
        if self.key_prefix.contains(['*', '?', '[', ']', '\\']) {
            return Err(ConfigurationError::invalid(
                "cache.key_prefix",
                "must not contain glob metacharacters (* ? [ ] \\)",
            ));
        }
        Ok(())
    }
}

/// File-level settings for a single breaker, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerComponentConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
    pub monitoring_period_ms: u64,
    pub volume_threshold: u64,
}

impl Default for CircuitBreakerComponentConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
            monitoring_period_ms: 120_000,
            volume_threshold: 10,
        }
    }
}

impl CircuitBreakerComponentConfig {
    /// Convert to resilience module's format
    pub fn to_resilience_config(&self) -> crate::resilience::CircuitBreakerConfig {
        crate::resilience::CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            timeout: Duration::from_millis(self.timeout_ms),
            monitoring_period: Duration::from_millis(self.monitoring_period_ms),
            volume_threshold: self.volume_threshold,
        }
    }
}

/// Breaker registry settings: a default plus per-component overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Registry capacity; breakers requested past it are not registered
    pub max_circuit_breakers: usize,

    /// Configuration for components without an override
    pub default: CircuitBreakerComponentConfig,

    /// Specific configurations for named components
    pub components: HashMap<String, CircuitBreakerComponentConfig>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            max_circuit_breakers: 50,
            default: CircuitBreakerComponentConfig::default(),
            components: HashMap::new(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Get configuration for a specific component
    pub fn config_for_component(&self, component_name: &str) -> CircuitBreakerComponentConfig {
        self.components
            .get(component_name)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_circuit_breakers == 0 {
            return Err(ConfigurationError::invalid(
                "circuit_breakers.max_circuit_breakers",
                "must be greater than 0",
            ));
        }

        let named = std::iter::once(("default", &self.default))
            .chain(self.components.iter().map(|(name, c)| (name.as_str(), c)));
        for (name, component) in named {
            component.to_resilience_config().validate().map_err(|e| match e {
                ConfigurationError::Invalid { field, reason } => ConfigurationError::Invalid {
                    field: format!("circuit_breakers.{name}.{field}"),
                    reason,
                },
                other => other,
            })?;
        }
        Ok(())
    }
}

/// Rate limiter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window
    pub max_requests: u64,
    /// Fixed window length in milliseconds
    pub window_ms: u64,
    /// Message returned with a rejection
    pub message: String,
    /// Prefix for counter keys in the remote store
    pub key_prefix: String,
    /// Interval of the background sweep removing stale local counters
    pub cleanup_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_ms: 60_000,
            message: "Too many requests, please try again later.".to_string(),
            key_prefix: "ratelimit:".to_string(),
            cleanup_interval_seconds: crate::constants::DEFAULT_SWEEP_INTERVAL_SECONDS,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_requests == 0 {
            return Err(ConfigurationError::invalid(
                "rate_limit.max_requests",
                "must be greater than 0",
            ));
        }
        if self.window_ms == 0 {
            return Err(ConfigurationError::invalid(
                "rate_limit.window_ms",
                "must be greater than 0",
            ));
        }
        if self.cleanup_interval_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "rate_limit.cleanup_interval_seconds",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// In-process metrics collector bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Capacity of the operation ring buffer
    pub operation_history: usize,
    /// Latency sample size that triggers trimming
    pub latency_sample_limit: usize,
    /// Samples kept after trimming
    pub latency_sample_retain: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            operation_history: 1000,
            latency_sample_limit: 10_000,
            latency_sample_retain: 5000,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.operation_history == 0 {
            return Err(ConfigurationError::invalid(
                "metrics.operation_history",
                "must be greater than 0",
            ));
        }
        if self.latency_sample_retain == 0 || self.latency_sample_retain >= self.latency_sample_limit
        {
            return Err(ConfigurationError::invalid(
                "metrics.latency_sample_retain",
                "must be greater than 0 and less than latency_sample_limit",
            ));
        }
        Ok(())
    }
}

/// Cache warmer scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmerConfig {
    /// Start the recurring warm-up when background tasks start
    pub auto_warm: bool,
    pub interval_seconds: u64,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            auto_warm: false,
            interval_seconds: 300,
        }
    }
}

impl WarmerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_seconds == 0 {
            return Err(ConfigurationError::invalid(
                "warmer.interval_seconds",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `brixsport_resilience=debug`;
    /// `RUST_LOG` takes precedence when set
    pub level: Option<String>,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(level) = &self.level {
            tracing_subscriber::EnvFilter::try_new(level).map_err(|e| {
                ConfigurationError::invalid("logging.level", format!("invalid filter: {e}"))
            })?;
        }
        Ok(())
    }
}
