//! # Cache Warming
//!
//! Pre-populates the two-tier cache so restarts and predictably hot keys do
//! not start cold. Strategies are registered by name and run one at a time,
//! highest priority first, either on demand or on a fixed interval.

pub mod scheduler;
pub mod strategy;

pub use scheduler::{CacheWarmer, WarmAllOutcome, WarmError, WarmSummary, WarmingStats};
pub use strategy::{FnStrategy, WarmingStrategy};
