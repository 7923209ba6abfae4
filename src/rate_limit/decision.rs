//! Counter records and the decisions derived from them.

use crate::constants::http::{
    HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET,
    HEADER_RETRY_AFTER, STATUS_TOO_MANY_REQUESTS,
};
use serde::{Deserialize, Serialize};

/// Requests counted for one client in the current fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub count: u64,
    /// Epoch millis at which the window closes
    pub window_reset_at: u64,
}

impl RateLimitRecord {
    pub fn fresh(now: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            window_reset_at: now.saturating_add(window_ms),
        }
    }

    /// Count one request, opening a new window first if this one has closed
    pub fn register_hit(&mut self, now: u64, window_ms: u64) {
        if now >= self.window_reset_at {
            *self = Self::fresh(now, window_ms);
        }
        self.count = self.count.saturating_add(1);
    }

    /// Whole seconds until the window closes, at least 1
    pub fn seconds_until_reset(&self, now: u64) -> u64 {
        self.window_reset_at.saturating_sub(now).div_ceil(1000).max(1)
    }
}

/// Quota metadata attached to a counted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch millis at which the window closes
    pub reset_at: u64,
    pub count: u64,
}

impl RateLimitInfo {
    pub fn from_record(record: &RateLimitRecord, limit: u64) -> Self {
        Self {
            limit,
            remaining: limit.saturating_sub(record.count),
            reset_at: record.window_reset_at,
            count: record.count,
        }
    }
}

/// Outcome of checking one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RateLimitDecision {
    Allowed(RateLimitInfo),
    Rejected {
        info: RateLimitInfo,
        retry_after_secs: u64,
        message: String,
    },
    /// Not counted: skipped by predicate or not attributable to a client
    Skipped,
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, RateLimitDecision::Rejected { .. })
    }

    pub fn info(&self) -> Option<&RateLimitInfo> {
        match self {
            RateLimitDecision::Allowed(info) | RateLimitDecision::Rejected { info, .. } => {
                Some(info)
            }
            RateLimitDecision::Skipped => None,
        }
    }

    /// Response status the host must send instead of handling the request
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RateLimitDecision::Rejected { .. } => Some(STATUS_TOO_MANY_REQUESTS),
            _ => None,
        }
    }

    /// Response headers describing the client's quota
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let Some(info) = self.info() else {
            return Vec::new();
        };

        let mut headers = vec![
            (HEADER_RATE_LIMIT_LIMIT, info.limit.to_string()),
            (HEADER_RATE_LIMIT_REMAINING, info.remaining.to_string()),
            (HEADER_RATE_LIMIT_RESET, info.reset_at.div_ceil(1000).to_string()),
        ];
        if let RateLimitDecision::Rejected {
            retry_after_secs, ..
        } = self
        {
            headers.push((HEADER_RETRY_AFTER, retry_after_secs.to_string()));
        }
        headers
    }

    pub(crate) fn as_label(&self) -> &'static str {
        match self {
            RateLimitDecision::Allowed(_) => "allowed",
            RateLimitDecision::Rejected { .. } => "rejected",
            RateLimitDecision::Skipped => "skipped",
        }
    }
}
