//! Warming strategies: named units of work that pre-populate the cache.

use crate::cache::TwoTierCache;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// A named procedure that writes predictably hot keys into the cache.
///
/// Strategies run one at a time, highest `priority` first. Errors are
/// reported to the warmer and never abort the remaining strategies.
#[async_trait]
pub trait WarmingStrategy: Send + Sync {
    /// Unique registry key
    fn name(&self) -> &str;

    fn priority(&self) -> i32 {
        0
    }

    /// Initial enabled state when registered
    fn enabled(&self) -> bool {
        true
    }

    async fn warm(&self, cache: &Arc<TwoTierCache>) -> anyhow::Result<()>;
}

type WarmFn = dyn Fn(Arc<TwoTierCache>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Adapts an async closure into a [`WarmingStrategy`]
pub struct FnStrategy {
    name: String,
    priority: i32,
    enabled: bool,
    run: Box<WarmFn>,
}

impl FnStrategy {
    pub fn new<F, Fut>(name: impl Into<String>, priority: i32, run: F) -> Self
    where
        F: Fn(Arc<TwoTierCache>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority,
            enabled: true,
            run: Box::new(move |cache| Box::pin(run(cache))),
        }
    }

    /// Register the strategy disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for FnStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStrategy")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[async_trait]
impl WarmingStrategy for FnStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn warm(&self, cache: &Arc<TwoTierCache>) -> anyhow::Result<()> {
        (self.run)(Arc::clone(cache)).await
    }
}
