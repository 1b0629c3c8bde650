// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Message and thread handlers (§4.7).

use crate::addressing::{expand_scope, parse_to};
use crate::handlers::{parse_params, require_params};
use crate::rpc::ConnectionContext;
use chrono::Utc;
use rusqlite::OptionalExtension;
use thrum_core::{Body, EventPayload, Message, MessageId, Scope, ThreadId};
use thrum_core::ThrumError;
use thrum_wire::method::{
    MessageListItem, MessageListParams, MessageListResult, MessageReadParams, MessageSendParams, ThreadCreateParams,
    ThreadReplyParams,
};
use thrum_wire::Warning;

fn message_exists(ctx: &ConnectionContext, message_id: &str) -> Result<bool, ThrumError> {
    let found = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT 1 FROM messages WHERE message_id = ?1 AND deleted_at IS NULL", [message_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
    })?;
    Ok(found.is_some())
}

fn thread_exists(ctx: &ConnectionContext, thread_id: &str) -> Result<bool, ThrumError> {
    let found = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT 1 FROM threads WHERE thread_id = ?1", [thread_id], |row| row.get::<_, i64>(0))
            .optional()
    })?;
    Ok(found.is_some())
}

/// Resolves `to` plus any explicit `scopes` into the full scope set and the
/// deduplicated agent names the message fans out to, collecting warnings
/// along the way (role fanout, §4.5).
fn resolve_addressing(
    ctx: &ConnectionContext,
    to: Option<String>,
    scopes: Vec<Scope>,
) -> Result<(Vec<Scope>, Vec<String>, Vec<Warning>), ThrumError> {
    if to.is_none() && scopes.is_empty() {
        return Err(ThrumError::invalid_argument("message must address a `to` or at least one scope"));
    }

    let resolved: Result<(Vec<Scope>, Vec<String>, Vec<Warning>), ThrumError> = ctx.state.with_connection(|conn| {
        let mut scopes = scopes;
        if let Some(to) = &to {
            match parse_to(conn, to) {
                Ok(scope) => scopes.push(scope),
                Err(err) => return Ok(Err(err)),
            }
        }

        let mut fanout = Vec::new();
        let mut warnings = Vec::new();
        for scope in &scopes {
            match expand_scope(conn, scope) {
                Ok((names, warning)) => {
                    for name in names {
                        if !fanout.contains(&name) {
                            fanout.push(name);
                        }
                    }
                    if let Some(warning) = warning {
                        warnings.push(warning);
                    }
                }
                Err(err) => return Ok(Err(err)),
            }
        }
        Ok(Ok((scopes, fanout, warnings)))
    })?;
    resolved
}

pub fn send(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: MessageSendParams = require_params(params)?;
    let binding = ctx.current_session()?;

    let body = Body { format: "text".to_string(), content: params.content };
    if body.exceeds_max() {
        return Err(ThrumError::invalid_argument("message content exceeds size limit"));
    }

    if let Some(thread_id) = &params.thread_id {
        if !thread_exists(ctx, thread_id.as_str())? {
            return Err(ThrumError::not_found(format!("thread {thread_id} does not exist")));
        }
    }

    let (scopes, fanout, warnings) = resolve_addressing(ctx, params.to, params.scopes)?;

    let message_id = MessageId::new();
    let authored_by = params.acting_as;
    let event = ctx.state.write_event(
        EventPayload::MessageCreate {
            message_id,
            thread_id: params.thread_id,
            agent_id: binding.agent_id,
            authored_by,
            disclosed: params.disclosed,
            session_id: binding.session_id,
            body: body.clone(),
            scopes: scopes.clone(),
            refs: params.refs.clone(),
            reply_to: None,
        },
        Some(&binding.agent_name),
    )?;

    let message = Message {
        message_id,
        thread_id: params.thread_id,
        agent_id: binding.agent_id,
        authored_by: None,
        disclosed: params.disclosed,
        session_id: binding.session_id,
        created_at: event.timestamp,
        body,
        scopes,
        refs: params.refs,
        reply_to: None,
    };
    ctx.subscriptions.notify_message(&message, &fanout);

    Ok(serde_json::json!({ "message_id": message_id, "sequence": event.sequence, "warnings": warnings }))
}

pub fn list(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: MessageListParams = parse_params(params)?;
    let filter = thrum_storage::MessageFilter {
        for_agent: params.for_agent,
        unread_for_agent: params.unread_for_agent,
        thread_id: params.thread_id.map(|t| t.as_str().to_string()),
        scope: params.scope,
        page: params.page,
        page_size: params.page_size,
    };
    let (rows, total) = ctx.state.with_connection(|conn| thrum_storage::list_messages(conn, &filter))?;
    let messages: Vec<MessageListItem> =
        rows.into_iter().map(|row| MessageListItem { message: row.message, read: row.read }).collect();
    let result = MessageListResult { messages, total, page: params.page, page_size: params.page_size };
    Ok(serde_json::to_value(result).map_err(|e| ThrumError::Internal(e.to_string()))?)
}

pub fn read(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: MessageReadParams = parse_params(params)?;
    let binding = ctx.current_session()?;
    let now = Utc::now().to_rfc3339();

    let marked = ctx.state.with_connection(|conn| {
        let mut marked = 0u64;
        if params.all {
            let mut stmt = conn.prepare(
                "SELECT m.message_id FROM messages m
                 WHERE m.deleted_at IS NULL
                   AND NOT EXISTS (SELECT 1 FROM message_reads r WHERE r.message_id = m.message_id AND r.agent_id = ?1)",
            )?;
            let ids: Vec<String> = stmt.query_map([binding.agent_id.as_str()], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
            for id in ids {
                marked += conn.execute(
                    "INSERT OR IGNORE INTO message_reads (message_id, agent_id, session_id, read_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![id, binding.agent_id.as_str(), binding.session_id.as_str(), now],
                )? as u64;
            }
        } else {
            for message_id in &params.message_ids {
                marked += conn.execute(
                    "INSERT OR IGNORE INTO message_reads (message_id, agent_id, session_id, read_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![message_id.as_str(), binding.agent_id.as_str(), binding.session_id.as_str(), now],
                )? as u64;
            }
        }
        Ok(marked)
    })?;

    Ok(serde_json::json!({ "marked": marked }))
}

pub fn thread_create(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: ThreadCreateParams = parse_params(params)?;
    let binding = ctx.current_session()?;

    let thread_id = ThreadId::new();
    ctx.state.write_event(
        EventPayload::ThreadCreate { thread_id, title: params.title, created_by: binding.agent_id },
        Some(&binding.agent_name),
    )?;

    let message_id = if let Some(content) = params.message {
        let body = Body { format: "text".to_string(), content };
        if body.exceeds_max() {
            return Err(ThrumError::invalid_argument("message content exceeds size limit"));
        }
        let (scopes, fanout, _warnings) = resolve_addressing(ctx, params.to, Vec::new())?;
        let message_id = MessageId::new();
        let event = ctx.state.write_event(
            EventPayload::MessageCreate {
                message_id,
                thread_id: Some(thread_id),
                agent_id: binding.agent_id,
                authored_by: None,
                disclosed: None,
                session_id: binding.session_id,
                body: body.clone(),
                scopes: scopes.clone(),
                refs: Vec::new(),
                reply_to: None,
            },
            Some(&binding.agent_name),
        )?;
        let message = Message {
            message_id,
            thread_id: Some(thread_id),
            agent_id: binding.agent_id,
            authored_by: None,
            disclosed: None,
            session_id: binding.session_id,
            created_at: event.timestamp,
            body,
            scopes,
            refs: Vec::new(),
            reply_to: None,
        };
        ctx.subscriptions.notify_message(&message, &fanout);
        Some(message_id)
    } else {
        None
    };

    Ok(serde_json::json!({ "thread_id": thread_id, "message_id": message_id }))
}

pub fn thread_reply(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: ThreadReplyParams = require_params(params)?;
    let binding = ctx.current_session()?;

    if !message_exists(ctx, params.parent_id.as_str())? {
        return Err(ThrumError::not_found(format!("message {} does not exist", params.parent_id)));
    }

    let parent_thread_id: Option<String> = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT thread_id FROM messages WHERE message_id = ?1", [params.parent_id.as_str()], |row| {
            row.get(0)
        })
        .optional()
    })?;

    // A reply inherits the parent's thread if it already has one, otherwise
    // it implicitly starts a fresh thread rooted at the parent (§3).
    let thread_id = match parent_thread_id.flatten() {
        Some(existing) => ThreadId::from_string(existing),
        None => {
            let thread_id = ThreadId::new();
            ctx.state.write_event(
                EventPayload::ThreadCreate { thread_id, title: None, created_by: binding.agent_id },
                Some(&binding.agent_name),
            )?;
            ctx.state.write_event(
                EventPayload::ThreadReply { thread_id, message_id: params.parent_id },
                Some(&binding.agent_name),
            )?;
            thread_id
        }
    };

    let body = Body { format: "text".to_string(), content: params.content };
    if body.exceeds_max() {
        return Err(ThrumError::invalid_argument("message content exceeds size limit"));
    }

    let parent_scopes: String = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT scopes FROM messages WHERE message_id = ?1", [params.parent_id.as_str()], |row| {
            row.get(0)
        })
    })?;
    let scopes: Vec<Scope> = serde_json::from_str(&parent_scopes).unwrap_or_default();
    let (_, fanout, _warnings) = resolve_addressing(ctx, None, scopes.clone())?;

    let message_id = MessageId::new();
    let event = ctx.state.write_event(
        EventPayload::MessageCreate {
            message_id,
            thread_id: Some(thread_id),
            agent_id: binding.agent_id,
            authored_by: None,
            disclosed: None,
            session_id: binding.session_id,
            body: body.clone(),
            scopes: scopes.clone(),
            refs: Vec::new(),
            reply_to: Some(params.parent_id),
        },
        Some(&binding.agent_name),
    )?;

    ctx.state.write_event(EventPayload::ThreadReply { thread_id, message_id }, Some(&binding.agent_name))?;

    let message = Message {
        message_id,
        thread_id: Some(thread_id),
        agent_id: binding.agent_id,
        authored_by: None,
        disclosed: None,
        session_id: binding.session_id,
        created_at: event.timestamp,
        body,
        scopes,
        refs: Vec::new(),
        reply_to: Some(params.parent_id),
    };
    ctx.subscriptions.notify_message(&message, &fanout);

    Ok(serde_json::json!({ "message_id": message_id, "thread_id": thread_id, "sequence": event.sequence }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SessionBinding;
    use crate::test_support::test_ctx;
    use thrum_core::AgentId;

    fn with_session(ctx: &ConnectionContext, agent_name: &str) -> SessionBinding {
        let binding = SessionBinding { session_id: thrum_core::SessionId::new(), agent_id: AgentId::new(), agent_name: agent_name.into() };
        ctx.bind_session(binding.clone());
        binding
    }

    fn send_params(to: &str, content: &str) -> serde_json::Value {
        serde_json::to_value(MessageSendParams {
            content: content.into(),
            to: Some(to.into()),
            thread_id: None,
            scopes: vec![],
            refs: vec![],
            priority: None,
            acting_as: None,
            disclosed: None,
        })
        .unwrap()
    }

    #[test]
    fn send_requires_a_bound_session() {
        let (ctx, _dir) = test_ctx();
        let err = send(&ctx, Some(send_params("@bob", "hi"))).unwrap_err();
        assert!(matches!(err, ThrumError::InvalidArgument(_)));
    }

    #[test]
    fn send_requires_some_address() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx, "alice");
        let params = MessageSendParams {
            content: "hi".into(),
            to: None,
            thread_id: None,
            scopes: vec![],
            refs: vec![],
            priority: None,
            acting_as: None,
            disclosed: None,
        };
        let err = send(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::InvalidArgument(_)));
    }

    #[test]
    fn sent_message_is_unread_until_marked() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx, "alice");
        send(&ctx, Some(send_params("@bob", "hello bob"))).unwrap();

        let list_params = MessageListParams { for_agent: Some("bob".into()), ..Default::default() };
        let result = list(&ctx, Some(serde_json::to_value(&list_params).unwrap())).unwrap();
        let messages = result["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["read"], false);
        assert_eq!(messages[0]["body"]["content"], "hello bob");

        let message_id = messages[0]["message_id"].as_str().unwrap().to_string();
        read(&ctx, Some(serde_json::json!({ "message_ids": [message_id] }))).unwrap();

        let result = list(&ctx, Some(serde_json::to_value(&list_params).unwrap())).unwrap();
        assert_eq!(result["messages"][0]["read"], true);
    }

    #[test]
    fn thread_reply_inherits_the_parent_thread() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx, "alice");
        let thread = thread_create(
            &ctx,
            Some(serde_json::to_value(ThreadCreateParams { title: Some("design".into()), to: Some("@bob".into()), message: Some("kickoff".into()) }).unwrap()),
        )
        .unwrap();
        let thread_id = thread["thread_id"].as_str().unwrap().to_string();
        let parent_id = thread["message_id"].as_str().unwrap().to_string();

        let reply = thread_reply(
            &ctx,
            Some(serde_json::to_value(ThreadReplyParams { parent_id: MessageId::from_string(&parent_id), content: "ack".into() }).unwrap()),
        )
        .unwrap();
        assert_eq!(reply["thread_id"].as_str().unwrap(), thread_id);
    }

    #[test]
    fn thread_reply_rejects_an_unknown_parent() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx, "alice");
        let params = ThreadReplyParams { parent_id: MessageId::new(), content: "ack".into() };
        let err = thread_reply(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::NotFound(_)));
    }
}
