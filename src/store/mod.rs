//! # Remote Store Module
//!
//! The shared L2 tier consumed by the two-tier cache and the rate limiter.
//!
//! ```text
//! RemoteStore (trait)          <- object safe, injected as Arc<dyn RemoteStore>
//!   ├── InMemoryStore          <- DashMap + expiry, single instance / tests
//!   └── RedisStore             <- ConnectionManager-based async Redis (feature `cache-redis`)
//! ```
//!
//! Store calls are never made directly by request code: they always go through
//! a circuit breaker (see [`crate::resilience::StoreFallback`]).

pub mod errors;
pub mod memory;
pub mod pattern;
#[cfg(feature = "cache-redis")]
pub mod redis_store;
pub mod traits;

pub use errors::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use pattern::{glob_matches, glob_to_regex};
#[cfg(feature = "cache-redis")]
pub use redis_store::RedisStore;
pub use traits::RemoteStore;
