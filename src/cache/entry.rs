//! Cache values and local entries.
//!
//! Every value carries the encoding chosen by the writer, so reads decode
//! deterministically instead of guessing whether a string "looks like" JSON.
//! In the remote tier the encoding travels as a tag in front of the payload:
//! `raw:<text>` or `json:<document>`.

use crate::clock::duration_millis;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const RAW_TAG: &str = "raw:";
const JSON_TAG: &str = "json:";

/// How a cached payload should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Opaque text, returned as-is
    Raw,
    /// A serialized JSON document
    Json,
}

/// A cached payload together with its encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedValue {
    pub encoding: Encoding,
    pub payload: String,
}

impl CachedValue {
    pub fn raw(payload: impl Into<String>) -> Self {
        Self {
            encoding: Encoding::Raw,
            payload: payload.into(),
        }
    }

    pub fn json<V: Serialize + ?Sized>(value: &V) -> Result<Self, serde_json::Error> {
        Ok(Self {
            encoding: Encoding::Json,
            payload: serde_json::to_string(value)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Decode into `V`. A `Raw` payload decodes as a JSON string, so it can
    /// only be read back as `String` (or another string-like type).
    pub fn decode<V: DeserializeOwned>(&self) -> Result<V, serde_json::Error> {
        match self.encoding {
            Encoding::Json => serde_json::from_str(&self.payload),
            Encoding::Raw => serde_json::from_value(serde_json::Value::String(self.payload.clone())),
        }
    }

    /// Tagged representation stored in the remote tier
    pub fn to_wire(&self) -> String {
        let tag = match self.encoding {
            Encoding::Raw => RAW_TAG,
            Encoding::Json => JSON_TAG,
        };
        format!("{tag}{}", self.payload)
    }

    /// Parse a remote value. Values without a known tag were written by
    /// something else and are treated as raw text in full.
    pub fn from_wire(wire: &str) -> Self {
        if let Some(payload) = wire.strip_prefix(JSON_TAG) {
            Self {
                encoding: Encoding::Json,
                payload: payload.to_string(),
            }
        } else if let Some(payload) = wire.strip_prefix(RAW_TAG) {
            Self::raw(payload)
        } else {
            Self::raw(wire)
        }
    }
}

/// A local-tier entry. `expires_at` is always strictly after `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: CachedValue,
    /// Epoch millis
    pub created_at: u64,
    /// Epoch millis
    pub expires_at: u64,
}

impl CacheEntry {
    /// Zero TTLs are clamped to one millisecond
    pub fn new(value: CachedValue, now: u64, ttl: Duration) -> Self {
        let ttl_millis = duration_millis(ttl).max(1);
        Self {
            value,
            created_at: now,
            expires_at: now.saturating_add(ttl_millis),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}
