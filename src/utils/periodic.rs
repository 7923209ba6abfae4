//! Recurring background tasks.
//!
//! A [`PeriodicTask`] owns a spawned tokio loop that ticks on a fixed interval.
//! Missed ticks are skipped rather than bursted. The loop ends when the tick
//! closure returns [`ControlFlow::Break`] (typically because the owner it holds
//! a `Weak` reference to has been dropped), when [`PeriodicTask::stop`] is
//! called, or when the handle is dropped.

use crate::config::{ConfigResult, ConfigurationError};
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `tick` every `period`. With `run_immediately` the first tick
    /// fires at once, otherwise after one full period.
    ///
    /// Must be called from within a tokio runtime. A zero `period` is
    /// rejected before anything is spawned.
    pub fn spawn<F, Fut>(
        name: &'static str,
        period: Duration,
        run_immediately: bool,
        mut tick: F,
    ) -> ConfigResult<Self>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if period.is_zero() {
            return Err(ConfigurationError::invalid(
                name,
                "period must be greater than 0",
            ));
        }

        debug!(
            task = name,
            period_ms = period.as_millis() as u64,
            "Starting periodic task"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            if !run_immediately {
                // The first tick of a tokio interval completes immediately
                ticker.tick().await;
            }

            loop {
                ticker.tick().await;
                if tick().await.is_break() {
                    debug!(task = name, "Periodic task owner gone, exiting");
                    break;
                }
            }
        });

        Ok(Self { name, handle })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the loop
    pub fn stop(self) {
        debug!(task = self.name, "Stopping periodic task");
        // Dropping aborts
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("test", Duration::from_secs(10), true, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_start_and_break() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let task = PeriodicTask::spawn("test", Duration::from_secs(10), false, move || {
            let counter = Arc::clone(&counter);
            async move {
                let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if seen >= 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let err = PeriodicTask::spawn("zero", Duration::ZERO, true, || async {
            ControlFlow::Continue(())
        })
        .unwrap_err();

        match err {
            ConfigurationError::Invalid { field, .. } => assert_eq!(field, "zero"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
