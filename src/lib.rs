#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, LRU in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Brixsport Resilience
//!
//! Caching and backpressure layer for the Brixsport live-score backend.
//!
//! ## Overview
//!
//! Request handlers in the web tier are thin: they validate input and read or
//! write through this crate. The crate keeps those reads fast while the shared
//! remote store is healthy and keeps them working while it is not.
//!
//! ## Architecture
//!
//! ```text
//! inbound request
//!   └── RateLimiter ───────────── admit / 429
//!         └── handler
//!               └── TwoTierCache
//!                     ├── L1 LocalCache (LRU + TTL)
//!                     └── L2 RemoteStore ── CircuitBreaker("remote_cache")
//!                                 every outcome ──> CacheMetricsCollector
//! CacheWarmer ── strategies ──> TwoTierCache (out of band)
//! ```
//!
//! ## Key Features
//!
//! - **Two-tier cache**: bounded LRU in front of a shared store, explicit
//!   `raw`/`json` value encoding, glob deletes, TTL sweeps
//! - **Circuit breakers**: per-component registry with sliding failure window,
//!   volume threshold and half-open probing
//! - **Graceful degradation**: remote failures turn into L1-only cache behaviour
//!   and per-instance rate limiting instead of request errors
//! - **Rate limiting**: fixed-window per-client quotas with standard headers
//! - **Cache warming**: prioritised strategies, on demand or on a timer
//! - **Observability**: in-process metrics with health rules, `tracing` logs and
//!   OpenTelemetry instruments
//!
//! ## Module Organization
//!
//! - [`cache`] - Two-tier cache, L1 map and value encoding
//! - [`resilience`] - Circuit breakers, registry and the fallback runner
//! - [`rate_limit`] - Rate limiter, request model and decisions
//! - [`warmer`] - Cache warmer and strategies
//! - [`metrics`] - Cache metrics collector, health rules, OpenTelemetry instruments
//! - [`store`] - Remote store contract and backends
//! - [`config`] - Configuration model and layered loader
//! - [`context`] - Wires everything together once per process
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brixsport_resilience::config::ConfigLoader;
//! use brixsport_resilience::store::InMemoryStore;
//! use brixsport_resilience::ResilienceContext;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let context = ResilienceContext::builder(config)
//!     .remote_store(Arc::new(InMemoryStore::new()))
//!     .build()?;
//! context.start_background_tasks()?;
//!
//! let cache = context.cache();
//! cache.set_json("match:42:score", &(2, 1), None).await?;
//! let score: Option<(u32, u32)> = cache.get_json("match:42:score").await?;
//! assert_eq!(score, Some((2, 1)));
//!
//! context.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                     # Unit tests
//! cargo test                           # Unit + integration tests
//! cargo test --features cache-redis    # Include the Redis backend
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod resilience;
pub mod store;
pub mod utils;
pub mod warmer;

pub use cache::{CacheStats, CachedValue, Encoding, TwoTierCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigLoader, ConfigurationError, ResilienceConfig};
pub use context::{ContextHealth, ResilienceContext, ResilienceContextBuilder};
pub use error::{ResilienceError, ResilienceResult};
pub use metrics::{CacheHealth, CacheMetrics, CacheMetricsCollector, LatencyPercentiles};
pub use rate_limit::{ClientRequest, RateLimitDecision, RateLimitInfo, RateLimiter};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerManager,
    CircuitState,
};
pub use store::{InMemoryStore, RemoteStore, StoreError};
pub use warmer::{CacheWarmer, FnStrategy, WarmAllOutcome, WarmError, WarmingStrategy};
