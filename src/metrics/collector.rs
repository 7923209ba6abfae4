//! In-process cache metrics collector.
//!
//! Counts hits, misses, sets, deletes and errors, keeps a bounded latency
//! sample for averages and percentiles, and keeps a bounded ring buffer of the
//! most recent operations. Recording never fails and never blocks on I/O.

use super::health::{self, CacheHealth};
use crate::clock::{Clock, SystemClock};
use crate::config::MetricsConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Kind of cache operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Get,
    Set,
    Delete,
    Clear,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Get => "get",
            OperationKind::Set => "set",
            OperationKind::Delete => "delete",
            OperationKind::Clear => "clear",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The remote tier was skipped because its breaker is open
    CircuitOpen,
    /// The remote store call failed
    RemoteStore,
    /// A value could not be encoded or decoded
    Serialization,
    Internal,
}

/// An error attached to an operation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedError {
    pub kind: ErrorKind,
    pub message: String,
}

/// One entry of the operation ring buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub key: String,
    /// Set for `get` operations
    pub hit: Option<bool>,
    pub duration_ms: f64,
    pub error: Option<RecordedError>,
    /// Epoch millis
    pub timestamp: u64,
}

/// Aggregated counters and derived rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub clears: u64,
    pub errors: u64,
    /// Hits, misses, sets, deletes and clears; errors are counted separately
    pub total_operations: u64,
    /// `hits / (hits + misses)` as a percentage rounded to 2 decimals
    pub hit_rate: f64,
    /// `errors / total_operations` as a percentage rounded to 2 decimals
    pub error_rate: f64,
    /// Mean of the latency sample in milliseconds
    pub average_latency_ms: f64,
    pub latency_sample_size: usize,
}

/// Latency percentiles over the current sample, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Default)]
struct CollectorState {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    clears: u64,
    errors: u64,
    latencies: Vec<f64>,
    history: VecDeque<OperationRecord>,
}

/// Thread-safe collector for cache operation outcomes
#[derive(Debug)]
pub struct CacheMetricsCollector {
    config: MetricsConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CollectorState>,
}

impl Default for CacheMetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default(), Arc::new(SystemClock))
    }
}

impl CacheMetricsCollector {
    pub fn new(config: MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CollectorState {
                history: VecDeque::with_capacity(config.operation_history),
                ..Default::default()
            }),
            config,
            clock,
        }
    }

    pub fn record_hit(&self, key: &str, duration_ms: f64) {
        self.record(OperationKind::Get, key, Some(true), duration_ms, |s| s.hits += 1);
    }

    pub fn record_miss(&self, key: &str, duration_ms: f64) {
        self.record(OperationKind::Get, key, Some(false), duration_ms, |s| {
            s.misses += 1
        });
    }

    pub fn record_set(&self, key: &str, duration_ms: f64) {
        self.record(OperationKind::Set, key, None, duration_ms, |s| s.sets += 1);
    }

    pub fn record_delete(&self, key: &str, duration_ms: f64) {
        self.record(OperationKind::Delete, key, None, duration_ms, |s| {
            s.deletes += 1
        });
    }

    pub fn record_clear(&self, duration_ms: f64) {
        self.record(OperationKind::Clear, "*", None, duration_ms, |s| s.clears += 1);
    }

    /// Count an error without touching hit/miss counters or the latency sample
    pub fn record_error(
        &self,
        kind: OperationKind,
        key: &str,
        error_kind: ErrorKind,
        message: impl Into<String>,
        duration_ms: f64,
    ) {
        let record = OperationRecord {
            kind,
            key: key.to_string(),
            hit: None,
            duration_ms,
            error: Some(RecordedError {
                kind: error_kind,
                message: message.into(),
            }),
            timestamp: self.clock.now_millis(),
        };

        let mut state = self.state.lock();
        state.errors += 1;
        self.push_history(&mut state, record);
    }

    fn record<F>(&self, kind: OperationKind, key: &str, hit: Option<bool>, duration_ms: f64, bump: F)
    where
        F: FnOnce(&mut CollectorState),
    {
        let record = OperationRecord {
            kind,
            key: key.to_string(),
            hit,
            duration_ms,
            error: None,
            timestamp: self.clock.now_millis(),
        };

        let mut state = self.state.lock();
        bump(&mut state);

        state.latencies.push(duration_ms);
        if state.latencies.len() > self.config.latency_sample_limit {
            let excess = state.latencies.len() - self.config.latency_sample_retain;
            state.latencies.drain(..excess);
        }

        self.push_history(&mut state, record);
    }

    fn push_history(&self, state: &mut CollectorState, record: OperationRecord) {
        if state.history.len() >= self.config.operation_history {
            state.history.pop_front();
        }
        state.history.push_back(record);
    }

    /// Snapshot of counters and derived rates
    pub fn get_metrics(&self) -> CacheMetrics {
        let state = self.state.lock();

        let gets = state.hits + state.misses;
        let total_operations = gets + state.sets + state.deletes + state.clears;

        let hit_rate = if gets == 0 {
            0.0
        } else {
            round2(state.hits as f64 / gets as f64 * 100.0)
        };
        let error_rate = if total_operations == 0 {
            0.0
        } else {
            round2(state.errors as f64 / total_operations as f64 * 100.0)
        };
        let average_latency_ms = if state.latencies.is_empty() {
            0.0
        } else {
            state.latencies.iter().sum::<f64>() / state.latencies.len() as f64
        };

        CacheMetrics {
            hits: state.hits,
            misses: state.misses,
            sets: state.sets,
            deletes: state.deletes,
            clears: state.clears,
            errors: state.errors,
            total_operations,
            hit_rate,
            error_rate,
            average_latency_ms,
            latency_sample_size: state.latencies.len(),
        }
    }

    /// 50th/95th/99th percentiles of the latency sample (zeros when empty)
    pub fn get_percentiles(&self) -> LatencyPercentiles {
        let mut sample = self.state.lock().latencies.clone();
        if sample.is_empty() {
            return LatencyPercentiles::default();
        }
        sample.sort_by(|a, b| a.total_cmp(b));

        LatencyPercentiles {
            p50: percentile(&sample, 50.0),
            p95: percentile(&sample, 95.0),
            p99: percentile(&sample, 99.0),
        }
    }

    pub fn get_health(&self) -> CacheHealth {
        health::evaluate(self.get_metrics())
    }

    /// Up to `limit` most recent operations, newest first
    pub fn recent_operations(&self, limit: usize) -> Vec<OperationRecord> {
        self.state
            .lock()
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Zero every counter and clear the sample and history
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CollectorState {
            history: VecDeque::with_capacity(self.config.operation_history),
            ..Default::default()
        };
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Rank `floor(p/100 * n)` of an ascending sample, clamped to the last index
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0 * sorted.len() as f64).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn collector_with(config: MetricsConfig) -> CacheMetricsCollector {
        CacheMetricsCollector::new(config, Arc::new(ManualClock::new(0)))
    }

    fn collector() -> CacheMetricsCollector {
        collector_with(MetricsConfig::default())
    }

    #[test]
    fn test_hit_rate_from_scripted_sequence() {
        let metrics = collector();
        metrics.record_hit("a", 1.0);
        metrics.record_hit("b", 1.0);
        metrics.record_hit("c", 1.0);
        metrics.record_miss("d", 1.0);

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.hit_rate, 75.0);
        assert_eq!(snapshot.total_operations, 4);
        assert_eq!(snapshot.errors, 0);
    }

    #[test]
    fn test_hit_rate_rounds_to_two_decimals() {
        let metrics = collector();
        metrics.record_hit("a", 1.0);
        metrics.record_miss("b", 1.0);
        metrics.record_miss("c", 1.0);
        assert_eq!(metrics.get_metrics().hit_rate, 33.33);
    }

    #[test]
    fn test_empty_collector() {
        let metrics = collector();
        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.hit_rate, 0.0);
        assert_eq!(snapshot.average_latency_ms, 0.0);
        assert_eq!(metrics.get_percentiles(), LatencyPercentiles::default());
    }

    #[test]
    fn test_errors_do_not_touch_hit_counts() {
        let metrics = collector();
        metrics.record_hit("a", 2.0);
        metrics.record_error(
            OperationKind::Get,
            "a",
            ErrorKind::RemoteStore,
            "connection refused",
            5.0,
        );

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.latency_sample_size, 1);
        assert_eq!(snapshot.error_rate, 100.0);

        let recent = metrics.recent_operations(1);
        assert_eq!(recent[0].error.as_ref().map(|e| e.kind), Some(ErrorKind::RemoteStore));
    }

    #[test]
    fn test_percentiles_use_floor_rank() {
        let metrics = collector();
        for i in 1..=100 {
            metrics.record_set("k", i as f64);
        }

        let p = metrics.get_percentiles();
        assert_eq!(p.p50, 51.0);
        assert_eq!(p.p95, 96.0);
        assert_eq!(p.p99, 100.0);
        assert_eq!(metrics.get_metrics().average_latency_ms, 50.5);
    }

    #[test]
    fn test_latency_sample_is_trimmed() {
        let metrics = collector_with(MetricsConfig {
            operation_history: 10,
            latency_sample_limit: 10,
            latency_sample_retain: 5,
        });
        for i in 0..11 {
            metrics.record_set("k", i as f64);
        }

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.latency_sample_size, 5);
        // The most recent samples survive
        assert_eq!(snapshot.average_latency_ms, 8.0);
    }

    #[test]
    fn test_history_ring_buffer_drops_oldest() {
        let metrics = collector_with(MetricsConfig {
            operation_history: 3,
            ..Default::default()
        });
        for key in ["a", "b", "c", "d"] {
            metrics.record_delete(key, 1.0);
        }

        let keys: Vec<String> = metrics
            .recent_operations(10)
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["d", "c", "b"]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = collector();
        metrics.record_hit("a", 1.0);
        metrics.record_clear(3.0);
        metrics.reset();

        let snapshot = metrics.get_metrics();
        assert_eq!(snapshot.total_operations, 0);
        assert_eq!(snapshot.latency_sample_size, 0);
        assert!(metrics.recent_operations(10).is_empty());
    }
}
