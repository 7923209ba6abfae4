//! # Metrics
//!
//! - `collector`: in-process counters, latency sample and operation history
//!   for the two-tier cache, queried for hit rate, percentiles and health
//! - `health`: the rules that turn a metrics snapshot into a health verdict
//! - `instruments`: OpenTelemetry counters and histograms for export

pub mod collector;
pub mod health;
pub mod instruments;

pub use collector::{
    CacheMetrics, CacheMetricsCollector, ErrorKind, LatencyPercentiles, OperationKind,
    OperationRecord, RecordedError,
};
pub use health::CacheHealth;
