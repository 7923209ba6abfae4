//! Two-branch degrade strategy shared by the cache and the rate limiter.
//!
//! The primary branch is a remote store reached through a circuit breaker;
//! the secondary branch is whatever process-local behaviour the caller
//! supplies. Callers never see remote errors, only which tier answered.

use crate::resilience::{CircuitBreaker, CircuitBreakerError};
use crate::store::{RemoteStore, StoreError, StoreResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which branch produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Secondary,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "remote",
            Tier::Secondary => "local",
        }
    }
}

/// Why the secondary branch ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// No remote store was configured
    NotConfigured,
    /// The breaker short-circuited the call
    CircuitOpen,
    /// The remote call ran and failed
    PrimaryFailed(String),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::NotConfigured => write!(f, "remote store not configured"),
            DegradeReason::CircuitOpen => write!(f, "circuit open"),
            DegradeReason::PrimaryFailed(msg) => write!(f, "remote store failed: {msg}"),
        }
    }
}

/// A value tagged with the tier that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Degraded<T> {
    pub value: T,
    pub tier: Tier,
}

impl<T> Degraded<T> {
    pub fn is_degraded(&self) -> bool {
        self.tier == Tier::Secondary
    }
}

/// Primary remote store behind a breaker, with a caller-supplied secondary
#[derive(Debug, Clone)]
pub struct StoreFallback {
    remote: Option<Arc<dyn RemoteStore>>,
    breaker: Arc<CircuitBreaker>,
}

impl StoreFallback {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { remote, breaker }
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteStore>> {
        self.remote.as_ref()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Whether the next call would be attempted against the remote store
    pub fn primary_available(&self) -> bool {
        self.remote.is_some() && self.breaker.would_admit()
    }

    /// Run `primary` against the remote store through the breaker, falling
    /// back to `secondary` when there is no remote, the circuit is open, or
    /// the remote call fails. Only transient store errors count toward
    /// tripping the breaker.
    pub async fn run<T, P, PFut, S>(&self, primary: P, secondary: S) -> Degraded<T>
    where
        P: FnOnce(Arc<dyn RemoteStore>) -> PFut,
        PFut: Future<Output = StoreResult<T>>,
        S: FnOnce(DegradeReason) -> T,
    {
        let Some(remote) = self.remote.clone() else {
            return Degraded {
                value: secondary(DegradeReason::NotConfigured),
                tier: Tier::Secondary,
            };
        };

        let provider = remote.provider_name();
        let result = self
            .breaker
            .call_filtered(|| primary(remote), StoreError::is_transient)
            .await;

        match result {
            Ok(value) => Degraded {
                value,
                tier: Tier::Primary,
            },
            Err(CircuitBreakerError::CircuitOpen { component }) => {
                debug!(component = %component, provider = provider, "Remote tier skipped, circuit open");
                Degraded {
                    value: secondary(DegradeReason::CircuitOpen),
                    tier: Tier::Secondary,
                }
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                warn!(
                    component = %self.breaker.name(),
                    provider = provider,
                    error = %e,
                    "Remote tier failed, degrading to local tier"
                );
                Degraded {
                    value: secondary(DegradeReason::PrimaryFailed(e.to_string())),
                    tier: Tier::Secondary,
                }
            }
        }
    }
}
