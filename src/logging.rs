//! # Structured Logging Module
//!
//! Environment-aware structured logging for the resilience layer. The host
//! application usually installs its own subscriber; this module exists for
//! binaries and tests that need one, and tolerates a subscriber already being
//! present.

use crate::config::loader::detect_environment;
use crate::config::{LogFormat, LoggingConfig};
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Filter precedence: `RUST_LOG`, then `config.level`, then a level derived
/// from the deployment environment.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let filter = build_filter(config, &environment);

        let registry = tracing_subscriber::registry().with(filter);
        let result = match config.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(true),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true),
                )
                .try_init(),
        };

        // A global subscriber set by the host is not an error
        if result.is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            environment = %environment,
            format = ?config.format,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn build_filter(config: &LoggingConfig, environment: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    config
        .level
        .as_deref()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(get_log_level(environment)))
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a cache operation with its outcome
pub fn log_cache_operation(
    operation: &str,
    key: &str,
    outcome: &str,
    tier: Option<&str>,
    duration_ms: f64,
) {
    tracing::debug!(
        operation = %operation,
        key = %key,
        outcome = %outcome,
        tier = tier,
        duration_ms = duration_ms,
        "💾 CACHE_OPERATION"
    );
}

/// Log a rate-limit rejection
pub fn log_rate_limit_rejection(client_id: &str, count: u64, limit: u64, retry_after_secs: u64) {
    tracing::warn!(
        client_id = %client_id,
        count = count,
        limit = limit,
        retry_after_secs = retry_after_secs,
        timestamp = %Utc::now().to_rfc3339(),
        "🚦 RATE_LIMIT_REJECTED"
    );
}

/// Log the outcome of one warming strategy run
pub fn log_warming_run(strategy: &str, success: bool, duration_ms: u64, error: Option<&str>) {
    if success {
        tracing::info!(
            strategy = %strategy,
            duration_ms = duration_ms,
            "🔥 CACHE_WARMING"
        );
    } else {
        tracing::error!(
            strategy = %strategy,
            duration_ms = duration_ms,
            error = error,
            "❌ CACHE_WARMING_FAILED"
        );
    }
}
