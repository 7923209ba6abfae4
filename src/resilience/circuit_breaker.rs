//! # Circuit Breaker Implementation
//!
//! Provides fault isolation for calls to a remote dependency. The breaker has
//! three states: Closed (normal operation), Open (failing fast), and Half-Open
//! (probing recovery).
//!
//! The circuit trips from Closed to Open when at least `volume_threshold`
//! requests have been seen and at least `failure_threshold` failures fall
//! inside the trailing `monitoring_period`. After `timeout` the next call moves
//! the circuit to Half-Open before the operation runs; `success_threshold`
//! consecutive successes close it again and any failure reopens it.
//!
//! State lives behind a synchronous mutex that is never held across an
//! `.await`, so counters are only touched before the protected call starts and
//! after it resolves. A caller that drops the future mid-flight leaves the
//! success/failure counters untouched.

use crate::clock::{duration_millis, Clock, SystemClock};
use crate::metrics::instruments;
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls are allowed while the circuit proves itself
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u64,
    consecutive_successes: u64,
    failure_timestamps: VecDeque<u64>,
    next_attempt_at: Option<u64>,
    total_requests: u64,
    rejected_requests: u64,
    success_count: u64,
    failure_count: u64,
    ignored_failures: u64,
    total_duration: Duration,
    last_state_change: u64,
}

impl BreakerState {
    fn new(now: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            failure_timestamps: VecDeque::new(),
            next_attempt_at: None,
            total_requests: 0,
            rejected_requests: 0,
            success_count: 0,
            failure_count: 0,
            ignored_failures: 0,
            total_duration: Duration::ZERO,
            last_state_change: now,
        }
    }

    fn prune_failures(&mut self, now: u64, monitoring_period: u64) {
        let cutoff = now.saturating_sub(monitoring_period);
        while let Some(&oldest) = self.failure_timestamps.front() {
            if oldest < cutoff {
                self.failure_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

enum Admission {
    Admitted,
    Rejected,
}

/// Core circuit breaker implementation
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Configuration parameters
    config: CircuitBreakerConfig,

    clock: Arc<dyn Clock>,

    state: Mutex<BreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a circuit breaker driven by an explicit clock
    pub fn with_clock(name: String, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            timeout_ms = duration_millis(config.timeout),
            monitoring_period_ms = duration_millis(config.monitoring_period),
            volume_threshold = config.volume_threshold,
            "🛡️ Circuit breaker initialized"
        );

        let now = clock.now_millis();
        Self {
            name,
            config,
            clock,
            state: Mutex::new(BreakerState::new(now)),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call made right now would reach the protected operation.
    ///
    /// Does not change state or counters.
    pub fn would_admit(&self) -> bool {
        let state = self.state.lock();
        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => state
                .next_attempt_at
                .map_or(true, |at| self.clock.now_millis() >= at),
        }
    }

    /// Execute an operation; every error counts toward tripping
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.guarded(operation, |_: &E| true).await
    }

    /// Execute an operation; only errors accepted by `error_filter` count
    /// toward tripping. Ignored errors are still returned to the caller.
    pub async fn call_filtered<F, T, E, Fut, P>(
        &self,
        operation: F,
        error_filter: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        self.guarded(operation, error_filter).await
    }

    /// Execute an operation, answering with `fallback` when the circuit
    /// rejects the call or the operation fails
    pub async fn call_with_fallback<F, T, E, Fut, FB, FbFut>(&self, operation: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(CircuitBreakerError<E>) -> FbFut,
        FbFut: Future<Output = T>,
    {
        self.execute(operation, |_: &E| true, fallback).await
    }

    /// Full form: error filter plus fallback.
    ///
    /// The fallback receives the rejection or the operation's error and its
    /// output replaces the propagated error.
    pub async fn execute<F, T, E, Fut, P, FB, FbFut>(
        &self,
        operation: F,
        error_filter: P,
        fallback: FB,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        FB: FnOnce(CircuitBreakerError<E>) -> FbFut,
        FbFut: Future<Output = T>,
    {
        match self.guarded(operation, error_filter).await {
            Ok(value) => value,
            Err(err) => fallback(err).await,
        }
    }

    async fn guarded<F, T, E, Fut, P>(
        &self,
        operation: F,
        error_filter: P,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        if let Admission::Rejected = self.admit() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(e) if error_filter(e) => self.record_failure(duration),
            Err(_) => self.record_ignored(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Count the request and decide whether it may run
    fn admit(&self) -> Admission {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        state.total_requests += 1;

        if state.state != CircuitState::Open {
            return Admission::Admitted;
        }

        match state.next_attempt_at {
            Some(at) if now < at => {
                state.rejected_requests += 1;
                debug!(
                    component = %self.name,
                    retry_in_ms = at - now,
                    "Circuit open, call rejected"
                );
                Admission::Rejected
            }
            _ => {
                self.transition(&mut state, CircuitState::HalfOpen, now);
                Admission::Admitted
            }
        }
    }

    fn record_success(&self, duration: Duration) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        state.success_count += 1;
        state.total_duration += duration;
        state.consecutive_failures = 0;
        state.consecutive_successes += 1;

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            "🟢 Operation succeeded"
        );

        match state.state {
            CircuitState::HalfOpen => {
                if state.consecutive_successes >= u64::from(self.config.success_threshold) {
                    self.transition(&mut state, CircuitState::Closed, now);
                }
            }
            CircuitState::Closed => {}
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late
                debug!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    fn record_failure(&self, duration: Duration) {
        let now = self.clock.now_millis();
        let monitoring_period = duration_millis(self.config.monitoring_period);
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.total_duration += duration;
        state.consecutive_successes = 0;
        state.consecutive_failures += 1;
        state.failure_timestamps.push_back(now);
        state.prune_failures(now, monitoring_period);

        warn!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            consecutive_failures = state.consecutive_failures,
            recent_failures = state.failure_timestamps.len(),
            "🔴 Operation failed"
        );

        match state.state {
            CircuitState::HalfOpen => {
                self.transition(&mut state, CircuitState::Open, now);
            }
            CircuitState::Closed => {
                let enough_volume = state.total_requests >= self.config.volume_threshold;
                let enough_failures = state.failure_timestamps.len() as u64
                    >= u64::from(self.config.failure_threshold);
                if enough_volume && enough_failures {
                    self.transition(&mut state, CircuitState::Open, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_ignored(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.ignored_failures += 1;
        state.total_duration += duration;
        debug!(
            component = %self.name,
            "Operation error ignored by error filter"
        );
    }

    /// Apply a state transition with the lock held
    fn transition(&self, state: &mut BreakerState, to: CircuitState, now: u64) {
        let from = state.state;
        state.state = to;
        state.last_state_change = now;

        match to {
            CircuitState::Open => {
                let next_attempt = now.saturating_add(duration_millis(self.config.timeout));
                state.next_attempt_at = Some(next_attempt);
                state.consecutive_successes = 0;
                error!(
                    component = %self.name,
                    from = %from,
                    recent_failures = state.failure_timestamps.len(),
                    failure_threshold = self.config.failure_threshold,
                    timeout_ms = duration_millis(self.config.timeout),
                    "🔴 Circuit breaker opened (failing fast)"
                );
            }
            CircuitState::HalfOpen => {
                state.consecutive_successes = 0;
                info!(
                    component = %self.name,
                    success_threshold = self.config.success_threshold,
                    "🟡 Circuit breaker half-open (testing recovery)"
                );
            }
            CircuitState::Closed => {
                state.next_attempt_at = None;
                state.consecutive_failures = 0;
                state.consecutive_successes = 0;
                state.failure_timestamps.clear();
                info!(
                    component = %self.name,
                    from = %from,
                    total_requests = state.total_requests,
                    "🟢 Circuit breaker closed"
                );
            }
        }

        instruments::record_breaker_transition(&self.name, from, to);
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        self.transition(&mut state, CircuitState::Open, now);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        self.transition(&mut state, CircuitState::Closed, now);
    }

    /// Force `Closed` and clear every counter
    pub fn reset(&self) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let previous = state.state;
        *state = BreakerState::new(now);
        if previous != CircuitState::Closed {
            instruments::record_breaker_transition(&self.name, previous, CircuitState::Closed);
        }
        info!(component = %self.name, "Circuit breaker reset");
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now_millis();
        let monitoring_period = duration_millis(self.config.monitoring_period);
        let mut state = self.state.lock();
        state.prune_failures(now, monitoring_period);

        let mut snapshot = CircuitBreakerMetrics::new();
        snapshot.total_requests = state.total_requests;
        snapshot.rejected_requests = state.rejected_requests;
        snapshot.success_count = state.success_count;
        snapshot.failure_count = state.failure_count;
        snapshot.ignored_failures = state.ignored_failures;
        snapshot.consecutive_failures = state.consecutive_failures;
        snapshot.consecutive_successes = state.consecutive_successes;
        snapshot.recent_failures = state.failure_timestamps.len();
        snapshot.total_duration = state.total_duration;
        snapshot.current_state = state.state;
        snapshot.next_attempt_at = state.next_attempt_at;
        snapshot.last_state_change = state.last_state_change;

        let executed = state.success_count + state.failure_count;
        if executed > 0 {
            snapshot.failure_rate = state.failure_count as f64 / executed as f64;
            snapshot.success_rate = state.success_count as f64 / executed as f64;
            let completed = executed + state.ignored_failures;
            snapshot.average_duration =
                state.total_duration / u32::try_from(completed).unwrap_or(u32::MAX);
        }

        snapshot
    }

    /// Check if circuit is healthy (closed state with low failure rate)
    pub fn is_healthy(&self) -> bool {
        let state = self.state.lock();
        if state.state != CircuitState::Closed {
            return false;
        }

        let executed = state.success_count + state.failure_count;
        if executed < 10 {
            // Too few calls to determine health
            return true;
        }

        let failure_rate = state.failure_count as f64 / executed as f64;
        failure_rate < 0.1
    }
}
