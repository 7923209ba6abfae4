//! # Resilience Module
//!
//! Fault isolation for the remote tiers used by the cache and the rate limiter.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: short-circuit calls to a failing remote store and probe recovery
//! - **Manager**: one breaker per component name, configured per component
//! - **Metrics**: breaker snapshots and a system-wide health score
//! - **Fallback**: the shared "remote through breaker, else local" strategy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use brixsport_resilience::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     success_threshold: 2,
//!     timeout: Duration::from_secs(30),
//!     monitoring_period: Duration::from_secs(60),
//!     volume_threshold: 10,
//! };
//!
//! let circuit_breaker = CircuitBreaker::new("remote_cache".to_string(), config);
//!
//! let result = circuit_breaker
//!     .call(|| async { Ok::<&str, std::io::Error>("success") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod fallback;
pub mod manager;
pub mod metrics;


pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use fallback::{DegradeReason, Degraded, StoreFallback, Tier};
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
