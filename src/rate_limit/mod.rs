//! # Rate Limiting
//!
//! Per-client fixed-window request counting. The host calls
//! [`RateLimiter::check`] for each inbound request and, on a
//! [`RateLimitDecision::Rejected`], answers with `status_code()` and
//! `headers()` instead of handling it.
//!
//! ```rust,no_run
//! use brixsport_resilience::config::RateLimitConfig;
//! use brixsport_resilience::rate_limit::{ClientRequest, RateLimiter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = RateLimiter::builder(RateLimitConfig::default())
//!     .skip(|request| request.path == "/health")
//!     .build()?;
//!
//! let request = ClientRequest::new("GET", "/api/matches").with_remote_addr("203.0.113.7");
//! let decision = limiter.check(&request).await;
//! if let Some(status) = decision.status_code() {
//!     println!("reject with {status}: {:?}", decision.headers());
//! }
//! # Ok(())
//! # }
//! ```

pub mod decision;
pub mod limiter;
pub mod request;

pub use decision::{RateLimitDecision, RateLimitInfo, RateLimitRecord};
pub use limiter::{RateLimiter, RateLimiterBuilder, RateLimiterStats};
pub use request::{
    forwarded_for_or_remote, remote_address, ClientRequest, KeyGenerator, SkipPredicate,
};
