// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Method name constants and the request/response payload shapes for every
//! handler the method registry dispatches to (§4.7).
//!
//! These are thin data contracts: validation and side effects live in the
//! daemon's handlers, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thrum_core::{
    AgentId, Checkpoint, Event, Filter, GroupId, Member, Message, MessageId, Ref, Scope,
    SessionId, SubscriptionId, ThreadId,
};

pub const MESSAGE_SEND: &str = "message.send";
pub const MESSAGE_LIST: &str = "message.list";
pub const MESSAGE_READ: &str = "message.read";
pub const THREAD_CREATE: &str = "thread.create";
pub const THREAD_REPLY: &str = "thread.reply";
pub const GROUP_CREATE: &str = "group.create";
pub const GROUP_ADD: &str = "group.add";
pub const GROUP_REMOVE: &str = "group.remove";
pub const GROUP_LIST: &str = "group.list";
pub const GROUP_MEMBERS: &str = "group.members";
pub const GROUP_DELETE: &str = "group.delete";
pub const SUBSCRIBE_CREATE: &str = "subscribe.create";
pub const UNSUBSCRIBE: &str = "unsubscribe";
pub const SYNC_PEER_INFO: &str = "sync.peer_info";
pub const SYNC_PULL: &str = "sync.pull";
pub const SYNC_NOTIFY: &str = "sync.notify";
pub const HEALTH: &str = "health";
pub const AGENT_REGISTER: &str = "agent.register";
pub const AGENT_DEREGISTER: &str = "agent.deregister";
pub const AGENT_LIST: &str = "agent.list";
pub const SESSION_START: &str = "session.start";
pub const SESSION_HEARTBEAT: &str = "session.heartbeat";
pub const SESSION_END: &str = "session.end";
pub const CONTEXT_SAVE: &str = "context.save";
pub const CONTEXT_CLEAR: &str = "context.clear";

/// Pushed to subscribers as a notification (no `id`), method
/// `"notification.message"`.
pub const NOTIFICATION_MESSAGE: &str = "notification.message";
/// Pushed when a subscriber's outbox drops entries (sequence jump).
pub const NOTIFICATION_GAP: &str = "notification.gap";

fn default_page_size() -> u32 {
    50
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSendParams {
    pub content: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub refs: Vec<Ref>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub acting_as: Option<String>,
    #[serde(default)]
    pub disclosed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSendResult {
    pub message_id: MessageId,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<crate::Warning>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageListParams {
    #[serde(default)]
    pub for_agent: Option<String>,
    #[serde(default)]
    pub unread_for_agent: Option<String>,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageListItem {
    #[serde(flatten)]
    pub message: Message,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageListResult {
    pub messages: Vec<MessageListItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReadParams {
    #[serde(default)]
    pub message_ids: Vec<MessageId>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReadResult {
    pub marked: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadCreateParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadCreateResult {
    pub thread_id: ThreadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadReplyParams {
    pub parent_id: MessageId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadReplyResult {
    pub message_id: MessageId,
    pub thread_id: ThreadId,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupCreateParams {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMemberParams {
    pub group_id: GroupId,
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIdParams {
    pub group_id: GroupId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMembersParams {
    pub group_id: GroupId,
    #[serde(default)]
    pub expand: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembersResult {
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeCreateParams {
    pub filter: Filter,
    #[serde(default)]
    pub buffer_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeCreateResult {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeParams {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPeerInfoResult {
    pub daemon_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPullParams {
    pub after_sequence: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPullResult {
    pub events: Vec<Event>,
    pub next_sequence: u64,
    pub more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncNotifyParams {
    pub daemon_id: String,
    pub latest_seq: u64,
    pub event_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub status: String,
    pub since: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<Checkpoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimitSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSummary {
    pub max_rps: f64,
    pub burst: u32,
    pub queue_depth: u32,
    pub max_queue_depth: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRegisterParams {
    pub name: String,
    pub role: String,
    pub module: String,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdParams {
    pub agent_id: AgentId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStartParams {
    pub agent_id: AgentId,
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIdParams {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSaveParams {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextClearParams {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    #[serde(default)]
    pub key: Option<String>,
}

// Re-exported so handlers can construct responses without reaching past
// this module for the underlying domain types.
pub use thrum_core::{Agent as AgentResult, Group as GroupResult, Session as SessionResult, Peer as PeerResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_send_params_default_page_unaffected() {
        let params: MessageSendParams =
            serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(params.content, "hi");
        assert!(params.scopes.is_empty());
    }

    #[test]
    fn message_list_params_defaults_page_size() {
        let params: MessageListParams = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(params.page_size, 50);
        assert_eq!(params.page, 0);
    }
}
