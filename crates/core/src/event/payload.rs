// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

use crate::agent::AgentId;
use crate::group::{GroupId, Member};
use crate::message::{Body, MessageId, Ref, Scope};
use crate::peer::PeerDaemonId;
use crate::session::SessionId;
use crate::subscription::{Filter, SubscriptionId};
use crate::thread::ThreadId;
use serde::{Deserialize, Serialize};

/// Per-type event payload, flattened alongside the envelope fields
/// (`event_id`, `sequence`, `timestamp`, `origin_daemon`) on [`super::Event`].
///
/// Closed to exactly these variants: an unrecognized `type` fails to
/// deserialize rather than falling back to a catch-all, matching the
/// schema-validation stage that rejects unknown types before they reach
/// the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "agent.register")]
    AgentRegister {
        agent_id: AgentId,
        name: String,
        role: String,
        module: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<String>,
        hostname: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_key: Option<String>,
    },

    #[serde(rename = "agent.deregister")]
    AgentDeregister { agent_id: AgentId },

    #[serde(rename = "session.start")]
    SessionStart {
        session_id: SessionId,
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },

    #[serde(rename = "session.end")]
    SessionEnd { session_id: SessionId },

    #[serde(rename = "session.heartbeat")]
    SessionHeartbeat { session_id: SessionId },

    #[serde(rename = "message.create")]
    MessageCreate {
        message_id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<ThreadId>,
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        authored_by: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disclosed: Option<bool>,
        session_id: SessionId,
        body: Body,
        scopes: Vec<Scope>,
        #[serde(default)]
        refs: Vec<Ref>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<MessageId>,
    },

    #[serde(rename = "message.edit")]
    MessageEdit { message_id: MessageId, body: Body },

    #[serde(rename = "message.delete")]
    MessageDelete { message_id: MessageId },

    #[serde(rename = "group.create")]
    GroupCreate {
        group_id: GroupId,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        created_by: AgentId,
    },

    #[serde(rename = "group.member.add")]
    GroupMemberAdd { group_id: GroupId, member: Member },

    #[serde(rename = "group.member.remove")]
    GroupMemberRemove { group_id: GroupId, member: Member },

    #[serde(rename = "group.delete")]
    GroupDelete { group_id: GroupId },

    #[serde(rename = "thread.create")]
    ThreadCreate {
        thread_id: ThreadId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        created_by: AgentId,
    },

    #[serde(rename = "thread.reply")]
    ThreadReply { thread_id: ThreadId, message_id: MessageId },

    #[serde(rename = "subscribe")]
    Subscribe {
        subscription_id: SubscriptionId,
        session_id: SessionId,
        filter: Filter,
        buffer_limit: usize,
    },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { subscription_id: SubscriptionId },

    /// Non-spec addition: lets an agent persist small scoped key/value
    /// context (e.g. a working-set note) alongside the log, so a restarted
    /// session can recover it without an out-of-band store.
    #[serde(rename = "context.save")]
    ContextSave { session_id: SessionId, agent_id: AgentId, key: String, value: serde_json::Value },

    #[serde(rename = "context.clear")]
    ContextClear {
        session_id: SessionId,
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },
}

impl EventPayload {
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventPayload::AgentRegister { .. } => "agent.register",
            EventPayload::AgentDeregister { .. } => "agent.deregister",
            EventPayload::SessionStart { .. } => "session.start",
            EventPayload::SessionEnd { .. } => "session.end",
            EventPayload::SessionHeartbeat { .. } => "session.heartbeat",
            EventPayload::MessageCreate { .. } => "message.create",
            EventPayload::MessageEdit { .. } => "message.edit",
            EventPayload::MessageDelete { .. } => "message.delete",
            EventPayload::GroupCreate { .. } => "group.create",
            EventPayload::GroupMemberAdd { .. } => "group.member.add",
            EventPayload::GroupMemberRemove { .. } => "group.member.remove",
            EventPayload::GroupDelete { .. } => "group.delete",
            EventPayload::ThreadCreate { .. } => "thread.create",
            EventPayload::ThreadReply { .. } => "thread.reply",
            EventPayload::Subscribe { .. } => "subscribe",
            EventPayload::Unsubscribe { .. } => "unsubscribe",
            EventPayload::ContextSave { .. } => "context.save",
            EventPayload::ContextClear { .. } => "context.clear",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_type_fails_to_deserialize() {
        let json = serde_json::json!({
            "type": "future.thing",
            "widget": "gizmo",
        });
        assert!(serde_json::from_value::<EventPayload>(json).is_err());
    }
}
