//! Remote store contract consumed by the two-tier cache and the rate limiter

use super::errors::StoreResult;
use async_trait::async_trait;

/// Key-value store with per-key expiry.
///
/// Any backend that can honour these five operations can serve as the shared
/// L2 tier (Redis, Dragonfly, the in-memory store, ...). Every call may suspend
/// on I/O, so callers route them through a circuit breaker.
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// Returns `Ok(Some(value))` on hit, `Ok(None)` when the key is absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key` for `ttl_seconds`
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Remove the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> StoreResult<u64>;

    /// Native glob scan (`*`, `?`)
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Liveness probe
    async fn ping(&self) -> StoreResult<()>;

    /// Name of the backing provider, used in logs and stats
    fn provider_name(&self) -> &'static str;
}
