//! Cache warmer: strategy registry, sequential runs and the auto-warming timer.

use super::strategy::WarmingStrategy;
use crate::cache::TwoTierCache;
use crate::clock::Clock;
use crate::config::ConfigResult;
use crate::logging::log_warming_run;
use crate::metrics::instruments;
use crate::utils::PeriodicTask;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WarmError {
    #[error("Unknown warming strategy: {0}")]
    UnknownStrategy(String),

    #[error("Warming strategy '{strategy}' failed: {source:#}")]
    StrategyFailed {
        strategy: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Per-strategy run history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarmingStats {
    /// Epoch millis of the last run start
    pub last_run_at: Option<u64>,
    pub last_duration_ms: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Rolling average over successful runs
    pub average_duration_ms: f64,
    pub last_error: Option<String>,
}

impl WarmingStats {
    fn record_success(&mut self, started_at: u64, duration_ms: u64) {
        self.last_run_at = Some(started_at);
        self.last_duration_ms = duration_ms;
        self.success_count += 1;
        let n = self.success_count as f64;
        self.average_duration_ms = (self.average_duration_ms * (n - 1.0) + duration_ms as f64) / n;
        self.last_error = None;
    }

    fn record_failure(&mut self, started_at: u64, duration_ms: u64, error: String) {
        self.last_run_at = Some(started_at);
        self.last_duration_ms = duration_ms;
        self.failure_count += 1;
        self.last_error = Some(error);
    }
}

/// Result of one `warm_all` pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub duration_ms: u64,
}

impl WarmSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmAllOutcome {
    /// Another pass was in progress; nothing ran
    AlreadyRunning,
    Completed(WarmSummary),
}

struct Registered {
    strategy: Arc<dyn WarmingStrategy>,
    enabled: bool,
    stats: WarmingStats,
}

/// Clears the busy flag even if the pass is cancelled mid-way
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CacheWarmer {
    cache: Arc<TwoTierCache>,
    clock: Arc<dyn Clock>,
    strategies: RwLock<HashMap<String, Registered>>,
    running: AtomicBool,
    auto_warming: Mutex<Option<PeriodicTask>>,
}

impl std::fmt::Debug for CacheWarmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWarmer")
            .field("strategies", &self.strategy_names())
            .field("running", &self.is_running())
            .field("auto_warming", &self.is_auto_warming())
            .finish()
    }
}

impl CacheWarmer {
    pub fn new(cache: Arc<TwoTierCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            strategies: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            auto_warming: Mutex::new(None),
        }
    }

    /// Add a strategy with zeroed stats. A strategy with the same name is
    /// replaced and its history discarded.
    pub fn register_strategy(&self, strategy: Arc<dyn WarmingStrategy>) {
        let name = strategy.name().to_string();
        let registered = Registered {
            enabled: strategy.enabled(),
            strategy,
            stats: WarmingStats::default(),
        };

        if self.strategies.write().insert(name.clone(), registered).is_some() {
            warn!(strategy = %name, "Replaced existing warming strategy");
        } else {
            info!(strategy = %name, "Registered warming strategy");
        }
    }

    /// Remove a strategy and its stats; returns whether it existed
    pub fn unregister_strategy(&self, name: &str) -> bool {
        let removed = self.strategies.write().remove(name).is_some();
        if removed {
            info!(strategy = %name, "Unregistered warming strategy");
        }
        removed
    }

    /// Include or exclude a strategy from `warm_all`; returns whether it exists
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.strategies.write().get_mut(name) {
            Some(registered) => {
                registered.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn strategy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run every enabled strategy once, highest priority first.
    ///
    /// Overlapping calls do nothing and return [`WarmAllOutcome::AlreadyRunning`].
    pub async fn warm_all(&self) -> WarmAllOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Warming pass already in progress, skipping");
            return WarmAllOutcome::AlreadyRunning;
        }
        let _busy = BusyGuard(&self.running);

        let mut queue: Vec<(i32, String)> = self
            .strategies
            .read()
            .values()
            .filter(|registered| registered.enabled)
            .map(|registered| {
                (
                    registered.strategy.priority(),
                    registered.strategy.name().to_string(),
                )
            })
            .collect();
        queue.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let started = Instant::now();
        let mut summary = WarmSummary::default();
        for (_, name) in queue {
            match self.run_strategy(&name).await {
                // Unregistered while the pass was running
                Err(WarmError::UnknownStrategy(_)) => continue,
                Err(_) => summary.failed.push(name),
                Ok(()) => summary.succeeded.push(name),
            }
        }
        summary.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            duration_ms = summary.duration_ms,
            "Cache warming pass complete"
        );
        WarmAllOutcome::Completed(summary)
    }

    /// Run one strategy now, regardless of its enabled flag or a pass in
    /// progress. The strategy's error is returned to the caller.
    pub async fn warm_by_strategy(&self, name: &str) -> Result<(), WarmError> {
        self.run_strategy(name).await
    }

    async fn run_strategy(&self, name: &str) -> Result<(), WarmError> {
        let strategy = self
            .strategies
            .read()
            .get(name)
            .map(|registered| Arc::clone(&registered.strategy))
            .ok_or_else(|| WarmError::UnknownStrategy(name.to_string()))?;

        let started_at = self.clock.now_millis();
        let start = Instant::now();
        let result = strategy.warm(&self.cache).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let error_text = result.as_ref().err().map(|e| format!("{e:#}"));
        log_warming_run(name, result.is_ok(), duration_ms, error_text.as_deref());
        instruments::record_warming_run(name, result.is_ok());

        if let Some(registered) = self.strategies.write().get_mut(name) {
            match &error_text {
                None => registered.stats.record_success(started_at, duration_ms),
                Some(error) => {
                    registered
                        .stats
                        .record_failure(started_at, duration_ms, error.clone())
                }
            }
        }

        result.map_err(|source| WarmError::StrategyFailed {
            strategy: name.to_string(),
            source,
        })
    }

    pub fn stats(&self, name: &str) -> Option<WarmingStats> {
        self.strategies
            .read()
            .get(name)
            .map(|registered| registered.stats.clone())
    }

    pub fn all_stats(&self) -> HashMap<String, WarmingStats> {
        self.strategies
            .read()
            .iter()
            .map(|(name, registered)| (name.clone(), registered.stats.clone()))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run `warm_all` now and then every `interval`. Replaces a running
    /// schedule. The timer holds a weak reference and stops once the warmer
    /// is dropped.
    /// A zero `interval` is rejected and leaves any running schedule alone.
    pub fn start_auto_warming(self: &Arc<Self>, interval: Duration) -> ConfigResult<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task = PeriodicTask::spawn("cache_auto_warming", interval, true, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(warmer) => {
                        warmer.warm_all().await;
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }
        })?;

        info!(
            interval_ms = interval.as_millis() as u64,
            "Auto-warming started"
        );
        *self.auto_warming.lock() = Some(task);
        Ok(())
    }

    pub fn stop_auto_warming(&self) {
        if let Some(task) = self.auto_warming.lock().take() {
            task.stop();
            info!("Auto-warming stopped");
        }
    }

    pub fn is_auto_warming(&self) -> bool {
        self.auto_warming.lock().is_some()
    }

    pub fn cache(&self) -> &Arc<TwoTierCache> {
        &self.cache
    }
}
