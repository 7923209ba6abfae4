//! # System Constants
//!
//! Shared defaults, component names and HTTP header names.

/// Default interval for background sweeps (expired L1 entries, stale rate-limit counters)
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60;

/// Breaker component names registered by the resilience context
pub mod components {
    pub const REMOTE_CACHE: &str = "remote_cache";
    pub const RATE_LIMITER: &str = "rate_limiter";
}

/// HTTP surface of a rate-limit decision
pub mod http {
    /// Status returned when a client exceeds its quota
    pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

    pub const HEADER_RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
    pub const HEADER_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
    pub const HEADER_RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
    pub const HEADER_RETRY_AFTER: &str = "Retry-After";

    /// Request header consulted by the forwarded-for key generator
    pub const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
}

/// Health thresholds applied by the cache metrics collector
pub mod health {
    /// Hit rate percentage below which the cache is reported unhealthy
    pub const MIN_HIT_RATE_PERCENT: f64 = 50.0;
    /// Operations required before the hit-rate rule applies
    pub const HIT_RATE_MIN_OPERATIONS: u64 = 100;
    /// Error rate percentage above which the cache is reported unhealthy
    pub const MAX_ERROR_RATE_PERCENT: f64 = 5.0;
    /// Average latency above which the cache is reported unhealthy
    pub const MAX_AVERAGE_LATENCY_MS: f64 = 100.0;
}
