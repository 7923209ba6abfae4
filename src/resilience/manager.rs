//! # Circuit Breaker Manager
//!
//! Registry of circuit breakers keyed by component name. Each name maps to a
//! single shared breaker for the lifetime of the manager; the manager itself is
//! constructed once and handed out through `ResilienceContext`.

use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerSettings;
use crate::resilience::{CircuitBreaker, CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Manager for multiple circuit breakers across system components
#[derive(Debug)]
pub struct CircuitBreakerManager {
    /// Collection of circuit breakers by component name
    circuit_breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,

    /// Configuration
    config: CircuitBreakerSettings,

    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    /// Create new circuit breaker manager from configuration
    pub fn from_config(config: &CircuitBreakerSettings) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CircuitBreakerSettings, clock: Arc<dyn Clock>) -> Self {
        info!(
            max_circuit_breakers = config.max_circuit_breakers,
            component_overrides = config.components.len(),
            "Initializing circuit breaker manager"
        );

        Self {
            circuit_breakers: RwLock::new(HashMap::new()),
            config: config.clone(),
            clock,
        }
    }

    /// Get or create circuit breaker for a component
    pub fn get_circuit_breaker(&self, component_name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.circuit_breakers.read().get(component_name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.circuit_breakers.write();

        // Double-check pattern (another thread might have created it)
        if let Some(breaker) = breakers.get(component_name) {
            return Arc::clone(breaker);
        }

        let component_config = self
            .config
            .config_for_component(component_name)
            .to_resilience_config();

        let breaker = Arc::new(CircuitBreaker::with_clock(
            component_name.to_string(),
            component_config,
            Arc::clone(&self.clock),
        ));

        if breakers.len() >= self.config.max_circuit_breakers {
            warn!(
                component = component_name,
                current_count = breakers.len(),
                max_allowed = self.config.max_circuit_breakers,
                "🚨 Maximum circuit breaker limit reached, returning unregistered breaker"
            );
            return breaker;
        }

        breakers.insert(component_name.to_string(), Arc::clone(&breaker));

        info!(
            component = component_name,
            total_circuit_breakers = breakers.len(),
            "Created new circuit breaker"
        );

        breaker
    }

    /// Get all circuit breaker names
    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self.circuit_breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Get metrics for a specific circuit breaker
    pub fn get_component_metrics(&self, component_name: &str) -> Option<CircuitBreakerMetrics> {
        self.circuit_breakers
            .read()
            .get(component_name)
            .map(|breaker| breaker.metrics())
    }

    /// Get system-wide circuit breaker metrics
    pub fn get_system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let mut system_metrics = SystemCircuitBreakerMetrics::new(self.clock.now_millis());

        for (name, breaker) in self.circuit_breakers.read().iter() {
            system_metrics.add_circuit_breaker(name.clone(), breaker.metrics());
        }

        system_metrics
    }

    /// Reset every registered breaker to closed with zeroed counters
    pub fn reset_all(&self) {
        let breakers = self.circuit_breakers.read();
        for breaker in breakers.values() {
            breaker.reset();
        }
        info!(count = breakers.len(), "All circuit breakers reset");
    }

    /// Force open all circuit breakers (emergency stop)
    pub fn force_open_all(&self) {
        warn!("🚨 Forcing all circuit breakers open (emergency stop)");
        for breaker in self.circuit_breakers.read().values() {
            breaker.force_open();
        }
    }

    /// Force close all circuit breakers (emergency recovery)
    pub fn force_close_all(&self) {
        warn!("🚨 Forcing all circuit breakers closed (emergency recovery)");
        for breaker in self.circuit_breakers.read().values() {
            breaker.force_closed();
        }
    }

    /// Remove circuit breaker for a component
    pub fn remove_circuit_breaker(&self, component_name: &str) -> bool {
        let mut breakers = self.circuit_breakers.write();
        if breakers.remove(component_name).is_some() {
            info!(
                component = component_name,
                remaining_count = breakers.len(),
                "Removed circuit breaker"
            );
            true
        } else {
            false
        }
    }

    /// Fraction of registered breakers currently healthy (1.0 when empty)
    pub fn system_health_score(&self) -> f64 {
        self.get_system_metrics().health_score()
    }

    pub fn config(&self) -> &CircuitBreakerSettings {
        &self.config
    }
}
