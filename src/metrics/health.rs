//! # Cache Health Rules
//!
//! The cache is healthy unless one of these holds:
//! - hit rate below 50% once more than 100 operations have been recorded
//! - error rate above 5% of all operations
//! - average latency above 100ms
//!
//! Each violated rule contributes one human-readable issue.

use super::collector::CacheMetrics;
use crate::constants::health::{
    HIT_RATE_MIN_OPERATIONS, MAX_AVERAGE_LATENCY_MS, MAX_ERROR_RATE_PERCENT, MIN_HIT_RATE_PERCENT,
};
use serde::{Deserialize, Serialize};

/// Health verdict with the metrics it was derived from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHealth {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub metrics: CacheMetrics,
}

/// Rules compare exact ratios from the counters; the rounded rates in
/// `metrics` are only used in the issue text.
pub fn evaluate(metrics: CacheMetrics) -> CacheHealth {
    let mut issues = Vec::new();

    if metrics.total_operations > HIT_RATE_MIN_OPERATIONS
        && exact_hit_rate(&metrics) < MIN_HIT_RATE_PERCENT
    {
        issues.push(format!("Low hit rate: {:.2}%", metrics.hit_rate));
    }

    if exact_error_rate(&metrics) > MAX_ERROR_RATE_PERCENT {
        issues.push(format!("High error rate: {:.2}%", metrics.error_rate));
    }

    if metrics.average_latency_ms > MAX_AVERAGE_LATENCY_MS {
        issues.push(format!(
            "High average latency: {:.2}ms",
            metrics.average_latency_ms
        ));
    }

    CacheHealth {
        healthy: issues.is_empty(),
        issues,
        metrics,
    }
}

fn exact_hit_rate(metrics: &CacheMetrics) -> f64 {
    let gets = metrics.hits + metrics.misses;
    if gets == 0 {
        return 0.0;
    }
    metrics.hits as f64 / gets as f64 * 100.0
}

fn exact_error_rate(metrics: &CacheMetrics) -> f64 {
    if metrics.total_operations == 0 {
        return 0.0;
    }
    metrics.errors as f64 / metrics.total_operations as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::CacheMetricsCollector;

    fn scripted(hits: usize, misses: usize) -> CacheMetricsCollector {
        let collector = CacheMetricsCollector::default();
        for i in 0..hits {
            collector.record_hit(&format!("hit:{i}"), 1.0);
        }
        for i in 0..misses {
            collector.record_miss(&format!("miss:{i}"), 1.0);
        }
        collector
    }

    #[test]
    fn test_low_hit_rate_after_enough_operations() {
        let health = scripted(40, 70).get_health();
        assert!(!health.healthy);
        assert_eq!(health.issues.len(), 1);
        assert!(health.issues[0].starts_with("Low hit rate"));
    }

    #[test]
    fn test_healthy_with_same_volume_and_good_hit_rate() {
        let health = scripted(60, 50).get_health();
        assert!(health.healthy);
        assert!(health.issues.is_empty());
    }

    #[test]
    fn test_low_hit_rate_ignored_below_volume() {
        let health = scripted(10, 90).get_health();
        assert_eq!(health.metrics.total_operations, 100);
        assert!(health.healthy);
    }

    #[test]
    fn test_error_rate_and_latency_rules() {
        let collector = scripted(10, 0);
        collector.record_set("slow", 2_000.0);
        collector.record_error(
            crate::metrics::OperationKind::Set,
            "slow",
            crate::metrics::ErrorKind::RemoteStore,
            "timeout",
            2_000.0,
        );

        let health = collector.get_health();
        assert!(!health.healthy);
        assert!(health.issues.iter().any(|i| i.starts_with("High error rate")));
        assert!(health
            .issues
            .iter()
            .any(|i| i.starts_with("High average latency")));
    }

    #[test]
    fn test_error_rate_just_over_limit_is_not_rounded_away() {
        // 125 / 2498 = 5.004%, displayed as 5.00
        let collector = scripted(2_498, 0);
        for i in 0..125 {
            collector.record_error(
                crate::metrics::OperationKind::Get,
                &format!("hit:{i}"),
                crate::metrics::ErrorKind::RemoteStore,
                "connection reset",
                1.0,
            );
        }

        let health = collector.get_health();
        assert_eq!(health.metrics.error_rate, 5.0);
        assert!(!health.healthy);
        assert_eq!(health.issues, vec!["High error rate: 5.00%".to_string()]);
    }

    #[test]
    fn test_hit_rate_just_under_half_is_low() {
        // 49_999 / 100_001 = 49.998%, displayed as 50.00
        let health = scripted(49_999, 50_002).get_health();
        assert_eq!(health.metrics.hit_rate, 50.0);
        assert!(!health.healthy);
        assert!(health.issues[0].starts_with("Low hit rate"));
    }
}
