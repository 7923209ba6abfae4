//! The slice of an inbound HTTP request the limiter looks at, and the stock
//! client-key generators.

use crate::constants::http::HEADER_FORWARDED_FOR;
use std::collections::HashMap;
use std::sync::Arc;

/// Framework-neutral view of an inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRequest {
    pub remote_addr: Option<String>,
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
}

impl ClientRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Header names are stored lower-cased
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Derives the client identifier counters are keyed by. `None` means the
/// request cannot be attributed and is admitted uncounted.
pub type KeyGenerator = Arc<dyn Fn(&ClientRequest) -> Option<String> + Send + Sync>;

/// Returns true for requests that bypass the limiter
pub type SkipPredicate = Arc<dyn Fn(&ClientRequest) -> bool + Send + Sync>;

/// Default key: the peer network address
pub fn remote_address(request: &ClientRequest) -> Option<String> {
    request
        .remote_addr
        .as_deref()
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
}

/// First hop of `X-Forwarded-For` when present, else the peer address.
///
/// Only use behind a proxy that overwrites the header.
pub fn forwarded_for_or_remote(request: &ClientRequest) -> Option<String> {
    request
        .header(HEADER_FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|client| !client.is_empty())
        .map(str::to_string)
        .or_else(|| remote_address(request))
}
