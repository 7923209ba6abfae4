//! # Two-Tier Cache
//!
//! ```text
//! TwoTierCache
//!   ├── L1: LocalCache         <- bounded LRU, per-entry TTL, in-process
//!   └── L2: RemoteStore        <- shared, behind the "remote_cache" breaker
//! ```
//!
//! Reads go L1 then L2 (an L2 hit is copied back into L1), writes go to both.
//! Keys are namespaced with `cache.key_prefix` before reaching either tier.

pub mod entry;
pub mod local;
pub mod two_tier;

pub use entry::{CacheEntry, CachedValue, Encoding};
pub use local::LocalCache;
pub use two_tier::{CacheStats, TwoTierCache};
