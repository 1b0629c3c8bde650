// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! JSON-RPC 2.0 envelope types.

use crate::error::ErrorObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const JSONRPC_VERSION: &str = "2.0";

fn is_jsonrpc_version(v: &str) -> bool {
    v == JSONRPC_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// A single JSON-RPC call. Requests carry `id`; [`Notification`] is the
/// same shape with `id` always absent, kept distinct so handlers can match
/// on type rather than on an `Option`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_valid_version(&self) -> bool {
        is_jsonrpc_version(&self.jsonrpc)
    }
}

/// A notification is a [`Request`] that the caller does not want a reply
/// to; `id` is always `None`. Kept as a thin alias rather than a distinct
/// wire shape, since JSON-RPC 2.0 draws the line solely on `id` presence.
pub type Notification = Request;

/// What one line of framed input decodes to: a lone call, or a batch.
/// Batches are dispatched concurrently and reassembled in their original
/// order before the combined response array is written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Batch(Vec<Request>),
    Single(Request),
}

impl Incoming {
    pub fn into_requests(self) -> Vec<Request> {
        match self {
            Incoming::Batch(reqs) => reqs,
            Incoming::Single(req) => vec![req],
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Incoming::Batch(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    pub id: Option<RequestId>,
}

impl Response {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self { jsonrpc: default_version(), result: Some(result), error: None, id }
    }

    pub fn failure(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self { jsonrpc: default_version(), result: None, error: Some(error), id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_has_no_id() {
        let req: Request = serde_json::from_str(r#"{"jsonrpc":"2.0","method":"health"}"#).unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn single_and_batch_both_parse_as_incoming() {
        let single: Incoming = serde_json::from_str(r#"{"jsonrpc":"2.0","method":"health","id":1}"#).unwrap();
        assert!(!single.is_batch());

        let batch: Incoming = serde_json::from_str(
            r#"[{"jsonrpc":"2.0","method":"health","id":1},{"jsonrpc":"2.0","method":"health","id":2}]"#,
        )
        .unwrap();
        assert!(batch.is_batch());
        assert_eq!(batch.into_requests().len(), 2);
    }

    #[test]
    fn response_round_trips() {
        let resp = Response::success(Some(RequestId::Number(7)), serde_json::json!({"ok": true}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"error\""));
        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }
}
