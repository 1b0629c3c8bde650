// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Messages: the unit of agent-to-agent communication.

use crate::agent::AgentId;
use crate::define_id;
use crate::session::SessionId;
use crate::thread::ThreadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on serialized `Body::content`, enforced before a message is
/// admitted to the event log.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

define_id! {
    pub struct MessageId("msg-");
}

/// A scoped address a message is published under: `@agent`, `@group`,
/// `@role`, or the `@everyone` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Scope {
    Agent(String),
    Group(String),
    Role(String),
    Everyone,
}

impl Scope {
    pub fn everyone() -> Self {
        Scope::Everyone
    }
}

/// A reference to external context: a file path, a URL, another message,
/// or a free-form tag. Carried verbatim, never interpreted by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Ref {
    File(String),
    Url(String),
    Message(MessageId),
    Tag(String),
}

/// Message content and its format tag. `format` is advisory to readers
/// (`"text"`, `"markdown"`, `"json"`, ...); the daemon never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    pub format: String,
    pub content: String,
}

impl Body {
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }

    pub fn exceeds_max(&self) -> bool {
        self.byte_len() > MAX_BODY_BYTES
    }
}

/// A single message, addressed to one or more [`Scope`]s.
///
/// `authored_by` and `disclosed` exist for the relay case: an agent
/// forwarding on behalf of a human or another tool sets `authored_by` to
/// the true author and `disclosed` to whether that attribution is shown
/// to recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authored_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosed: Option<bool>,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub body: Body,
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub refs: Vec<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_over_limit_is_rejected() {
        let body = Body { format: "text".into(), content: "x".repeat(MAX_BODY_BYTES + 1) };
        assert!(body.exceeds_max());
    }

    #[test]
    fn body_at_limit_is_accepted() {
        let body = Body { format: "text".into(), content: "x".repeat(MAX_BODY_BYTES) };
        assert!(!body.exceeds_max());
    }
}
