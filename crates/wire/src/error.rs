// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! JSON-RPC error codes and the `data.kind` taxonomy carried alongside them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thrum_core::ThrumError;

/// Standard JSON-RPC 2.0 codes plus the domain-specific ones the sync
/// engine uses literally (§4.8, §8 scenario S6).
pub mod code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const NOT_FOUND: i64 = -32004;
    pub const CONFLICT: i64 = -32009;
    pub const CANCELED: i64 = -32010;
    pub const UNAVAILABLE: i64 = -32011;

    /// Per-peer token bucket exhausted (§4.8, S6).
    pub const RATE_LIMITED: i64 = 429;
    /// Global queue-depth cap saturated (§4.8).
    pub const QUEUE_SATURATED: i64 = 503;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        let mut data = self.data.take().unwrap_or_else(|| json!({}));
        if let Value::Object(ref mut map) = data {
            map.insert("kind".to_string(), json!(kind));
        }
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(code::METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(code::PARSE_ERROR, detail.into())
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(code::INVALID_REQUEST, detail.into())
    }

    pub fn rate_limited(peer_id: &str) -> Self {
        Self::new(code::RATE_LIMITED, "rate limit exceeded")
            .with_kind("Unavailable")
            .with_data_field("peer_id", json!(peer_id))
    }

    pub fn queue_saturated() -> Self {
        Self::new(code::QUEUE_SATURATED, "queue depth exceeded").with_kind("Unavailable")
    }

    fn with_data_field(mut self, key: &str, value: Value) -> Self {
        let mut data = self.data.take().unwrap_or_else(|| json!({}));
        if let Value::Object(ref mut map) = data {
            map.insert(key.to_string(), value);
        }
        self.data = Some(data);
        self
    }
}

impl From<&ThrumError> for ErrorObject {
    fn from(err: &ThrumError) -> Self {
        let code = match err {
            ThrumError::InvalidArgument(_) => code::INVALID_PARAMS,
            ThrumError::NotFound(_) => code::NOT_FOUND,
            ThrumError::Conflict { .. } => code::CONFLICT,
            ThrumError::Canceled => code::CANCELED,
            ThrumError::Internal(_) => code::INTERNAL_ERROR,
            ThrumError::Unavailable(_) => code::UNAVAILABLE,
        };
        ErrorObject::new(code, err.to_string()).with_kind(err.kind_tag())
    }
}

impl From<ThrumError> for ErrorObject {
    fn from(err: ThrumError) -> Self {
        ErrorObject::from(&err)
    }
}

/// A non-fatal advisory attached to an otherwise successful response, e.g.
/// `role_fanout` on `message.send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub fn role_fanout(role: &str, count: usize) -> Self {
        Self {
            code: "role_fanout".to_string(),
            message: format!("delivered to {count} agent(s) with role {role:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_core::ConflictKind;

    #[test]
    fn conflict_carries_kind_tag() {
        let err = ThrumError::conflict(ConflictKind::Cycle, "a->b->a");
        let obj = ErrorObject::from(&err);
        assert_eq!(obj.code, code::CONFLICT);
        assert_eq!(obj.data.unwrap()["kind"], "Conflict");
    }

    #[test]
    fn rate_limited_carries_peer_id() {
        let obj = ErrorObject::rate_limited("prd-p1");
        assert_eq!(obj.code, 429);
        assert_eq!(obj.data.unwrap()["peer_id"], "prd-p1");
    }
}
