// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! The reducer: `apply(event, db) -> db'` (§4.2).
//!
//! Idempotent by construction: the `events` insert is the dedup gate. If an
//! `event_id` is already present the row-level reducers below never run,
//! so replaying the same event (local re-delivery, a peer resending after
//! a dropped ack) is always a no-op.

use crate::error::Result;
use rusqlite::{params, Connection};
use thrum_core::{Event, EventPayload};

pub fn apply(conn: &Connection, event: &Event) -> Result<()> {
    let payload_json = serde_json::to_string(&event.payload)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO events (event_id, sequence, type, timestamp, origin_daemon, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.sequence,
            event.type_tag(),
            event.timestamp.to_rfc3339(),
            event.origin_daemon,
            payload_json,
        ],
    )?;
    if inserted == 0 {
        return Ok(());
    }

    let ts = event.timestamp.to_rfc3339();
    match &event.payload {
        EventPayload::AgentRegister { agent_id, name, role, module, display, hostname, public_key } => {
            conn.execute(
                "INSERT INTO agents (agent_id, name, role, module, display, hostname, public_key, registered_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(agent_id) DO UPDATE SET
                    name = excluded.name, role = excluded.role, module = excluded.module,
                    display = excluded.display, hostname = excluded.hostname,
                    public_key = excluded.public_key, last_seen_at = excluded.last_seen_at,
                    deregistered_at = NULL",
                params![agent_id.as_str(), name, role, module, display, hostname, public_key, ts],
            )?;
        }
        EventPayload::AgentDeregister { agent_id } => {
            conn.execute(
                "UPDATE agents SET deregistered_at = ?2 WHERE agent_id = ?1",
                params![agent_id.as_str(), ts],
            )?;
        }
        EventPayload::SessionStart { session_id, agent_id, intent } => {
            conn.execute(
                "INSERT INTO sessions (session_id, agent_id, started_at, ended_at, last_seen_at, intent)
                 VALUES (?1, ?2, ?3, NULL, ?3, ?4)",
                params![session_id.as_str(), agent_id.as_str(), ts, intent],
            )?;
        }
        EventPayload::SessionEnd { session_id } => {
            conn.execute(
                "UPDATE sessions SET ended_at = ?2, last_seen_at = ?2 WHERE session_id = ?1",
                params![session_id.as_str(), ts],
            )?;
        }
        EventPayload::SessionHeartbeat { session_id } => {
            conn.execute(
                "UPDATE sessions SET last_seen_at = ?2 WHERE session_id = ?1",
                params![session_id.as_str(), ts],
            )?;
        }
        EventPayload::MessageCreate {
            message_id,
            thread_id,
            agent_id,
            authored_by,
            disclosed,
            session_id,
            body,
            scopes,
            refs,
            reply_to,
        } => {
            let scopes_json = serde_json::to_string(scopes)?;
            let refs_json = serde_json::to_string(refs)?;
            conn.execute(
                "INSERT OR IGNORE INTO messages
                    (message_id, thread_id, agent_id, authored_by, disclosed, session_id,
                     created_at, format, content, scopes, refs, reply_to)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    message_id.as_str(),
                    thread_id.as_ref().map(|t| t.as_str().to_string()),
                    agent_id.as_str(),
                    authored_by,
                    disclosed,
                    session_id.as_str(),
                    ts,
                    body.format,
                    body.content,
                    scopes_json,
                    refs_json,
                    reply_to.as_ref().map(|m| m.as_str().to_string()),
                ],
            )?;
        }
        EventPayload::MessageEdit { message_id, body } => {
            conn.execute(
                "UPDATE messages SET format = ?2, content = ?3 WHERE message_id = ?1",
                params![message_id.as_str(), body.format, body.content],
            )?;
        }
        EventPayload::MessageDelete { message_id } => {
            conn.execute(
                "UPDATE messages SET deleted_at = ?2 WHERE message_id = ?1",
                params![message_id.as_str(), ts],
            )?;
        }
        EventPayload::GroupCreate { group_id, name, description, created_by } => {
            conn.execute(
                "INSERT OR IGNORE INTO groups (group_id, name, description, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![group_id.as_str(), name, description, created_by.as_str(), ts],
            )?;
        }
        EventPayload::GroupMemberAdd { group_id, member } => {
            conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, member_type, member_value) VALUES (?1, ?2, ?3)",
                params![group_id.as_str(), member_type_tag(member.member_type), member.member_value],
            )?;
            conn.execute("UPDATE groups SET updated_at = ?2 WHERE group_id = ?1", params![group_id.as_str(), ts])?;
        }
        EventPayload::GroupMemberRemove { group_id, member } => {
            conn.execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND member_type = ?2 AND member_value = ?3",
                params![group_id.as_str(), member_type_tag(member.member_type), member.member_value],
            )?;
            conn.execute("UPDATE groups SET updated_at = ?2 WHERE group_id = ?1", params![group_id.as_str(), ts])?;
        }
        EventPayload::GroupDelete { group_id } => {
            conn.execute("UPDATE groups SET deleted_at = ?2 WHERE group_id = ?1", params![group_id.as_str(), ts])?;
        }
        EventPayload::ThreadCreate { thread_id, title, created_by } => {
            conn.execute(
                "INSERT OR IGNORE INTO threads (thread_id, title, created_at, created_by) VALUES (?1, ?2, ?3, ?4)",
                params![thread_id.as_str(), title, ts, created_by.as_str()],
            )?;
        }
        EventPayload::ThreadReply { thread_id, message_id } => {
            conn.execute(
                "UPDATE messages SET thread_id = ?2 WHERE message_id = ?1 AND thread_id IS NULL",
                params![message_id.as_str(), thread_id.as_str()],
            )?;
        }
        // Subscriptions are session-scoped and never persisted to the
        // projection (§3); the events table entry above is their only
        // durable trace, kept for audit/replay parity.
        EventPayload::Subscribe { .. } | EventPayload::Unsubscribe { .. } => {}
        // Ditto for ad hoc context notes: durable in the log, not reduced
        // into a queryable table here.
        EventPayload::ContextSave { .. } | EventPayload::ContextClear { .. } => {}
    }
    Ok(())
}

fn member_type_tag(member_type: thrum_core::MemberType) -> &'static str {
    match member_type {
        thrum_core::MemberType::Agent => "agent",
        thrum_core::MemberType::Role => "role",
        thrum_core::MemberType::Group => "group",
    }
}

pub fn apply_all(conn: &Connection, events: &[Event]) -> Result<()> {
    for event in events {
        apply(conn, event)?;
    }
    Ok(())
}
