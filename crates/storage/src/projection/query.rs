// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Read-side queries over the projection (backs `message.list`, `health`,
//! group expansion, and friends).

use crate::error::Result;
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use thrum_core::{Body, Member, MemberType, Message, MessageId, Ref, Scope, SessionId};

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub for_agent: Option<String>,
    pub unread_for_agent: Option<String>,
    pub thread_id: Option<String>,
    pub scope: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub message: Message,
    pub read: bool,
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let scopes_json: String = row.get("scopes")?;
    let refs_json: String = row.get("refs")?;
    let scopes: Vec<Scope> = serde_json::from_str(&scopes_json).unwrap_or_default();
    let refs: Vec<Ref> = serde_json::from_str(&refs_json).unwrap_or_default();
    let thread_id: Option<String> = row.get("thread_id")?;
    let reply_to: Option<String> = row.get("reply_to")?;
    Ok(Message {
        message_id: MessageId::from_string(row.get::<_, String>("message_id")?),
        thread_id: thread_id.map(thrum_core::ThreadId::from_string),
        agent_id: thrum_core::AgentId::from_string(row.get::<_, String>("agent_id")?),
        authored_by: row.get("authored_by")?,
        disclosed: row.get("disclosed")?,
        session_id: SessionId::from_string(row.get::<_, String>("session_id")?),
        created_at: row.get("created_at")?,
        body: Body { format: row.get("format")?, content: row.get("content")? },
        scopes,
        refs,
        reply_to: reply_to.map(MessageId::from_string),
    })
}

/// Paginated message listing with optional unread-state filtering. Returns
/// `(rows, total_matching)`; `total_matching` ignores pagination so callers
/// can compute page counts.
pub fn list_messages(conn: &Connection, filter: &MessageFilter) -> Result<(Vec<MessageRow>, u64)> {
    let mut clauses = vec!["m.deleted_at IS NULL".to_string()];
    let mut args: Vec<SqlValue> = Vec::new();

    if let Some(agent) = &filter.for_agent {
        clauses.push("m.agent_id = ?".to_string());
        args.push(SqlValue::Text(agent.clone()));
    }
    if let Some(thread_id) = &filter.thread_id {
        clauses.push("m.thread_id = ?".to_string());
        args.push(SqlValue::Text(thread_id.clone()));
    }
    if let Some(scope) = &filter.scope {
        clauses.push("m.scopes LIKE ?".to_string());
        args.push(SqlValue::Text(format!("%{scope}%")));
    }

    let unread_agent = filter.unread_for_agent.clone();
    let where_clause = clauses.join(" AND ");

    let count_sql = format!("SELECT COUNT(*) FROM messages m WHERE {where_clause}");
    let total: u64 = conn.query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))?;

    let page_size = filter.page_size.max(1);
    let offset = (filter.page as i64) * (page_size as i64);

    let select_sql = format!(
        "SELECT m.* FROM messages m WHERE {where_clause} ORDER BY m.created_at ASC LIMIT ? OFFSET ?"
    );
    let mut stmt = conn.prepare(&select_sql)?;
    let mut all_args = args.clone();
    all_args.push(SqlValue::Integer(page_size as i64));
    all_args.push(SqlValue::Integer(offset));
    let rows = stmt.query_map(params_from_iter(all_args.iter()), row_to_message)?;

    let mut out = Vec::new();
    for message in rows {
        let message = message?;
        let read = if let Some(agent) = &unread_agent {
            read_exists(conn, message.message_id.as_str(), agent)?
        } else {
            true
        };
        if unread_agent.is_some() && read {
            continue;
        }
        out.push(MessageRow { message, read });
    }
    Ok((out, total))
}

fn read_exists(conn: &Connection, message_id: &str, agent_id: &str) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM message_reads WHERE message_id = ?1 AND agent_id = ?2",
            rusqlite::params![message_id, agent_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(exists.is_some())
}

pub fn agent_count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM agents WHERE deregistered_at IS NULL", [], |row| row.get(0))?)
}

pub fn message_count(conn: &Connection) -> Result<u64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM messages WHERE deleted_at IS NULL", [], |row| row.get(0))?)
}

pub fn unread_count(conn: &Connection, agent_id: &str) -> Result<u64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM messages m
         WHERE m.deleted_at IS NULL
           AND NOT EXISTS (SELECT 1 FROM message_reads r WHERE r.message_id = m.message_id AND r.agent_id = ?1)",
        rusqlite::params![agent_id],
        |row| row.get(0),
    )?)
}

pub fn list_agents(conn: &Connection) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT agent_id, name, role FROM agents WHERE deregistered_at IS NULL ORDER BY registered_at ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Direct (one-hop) members of `group_id`, as stored — callers needing the
/// fixed-point expansion compose this with [`thrum_core::would_cycle`]'s
/// traversal style.
pub fn group_members(conn: &Connection, group_id: &str) -> Result<Vec<Member>> {
    let mut stmt =
        conn.prepare("SELECT member_type, member_value FROM group_members WHERE group_id = ?1")?;
    let rows = stmt.query_map([group_id], |row| {
        let member_type: String = row.get(0)?;
        let member_value: String = row.get(1)?;
        let member_type = match member_type.as_str() {
            "agent" => MemberType::Agent,
            "role" => MemberType::Role,
            _ => MemberType::Group,
        };
        Ok(Member { member_type, member_value })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Looks up a live group's id by its unique name, for addressing's
/// unprefixed-token resolution (group name takes priority over role and
/// agent name).
pub fn find_group_id_by_name(conn: &Connection, name: &str) -> Result<Option<String>> {
    conn.query_row("SELECT group_id FROM groups WHERE name = ?1 AND deleted_at IS NULL", [name], |row| row.get(0))
        .optional()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{apply, open_in_memory};
    use chrono::Utc;
    use thrum_core::{AgentId, Event, EventPayload, SessionId as CoreSessionId};

    fn register(conn: &Connection, agent_id: &AgentId, name: &str) {
        apply(
            conn,
            &Event {
                event_id: format!("evt-{name}"),
                sequence: 1,
                timestamp: Utc::now(),
                origin_daemon: "dmn-local".into(),
                payload: EventPayload::AgentRegister {
                    agent_id: agent_id.clone(),
                    name: name.into(),
                    role: "implementer".into(),
                    module: "auth".into(),
                    display: None,
                    hostname: "host1".into(),
                    public_key: None,
                },
            },
        )
        .unwrap();
    }

    #[test]
    fn unread_filter_excludes_read_messages() {
        let conn = open_in_memory().unwrap();
        let sender = AgentId::new();
        let reader = AgentId::new();
        register(&conn, &sender, "impl1");
        register(&conn, &reader, "impl2");

        let session_id = CoreSessionId::new();
        apply(
            &conn,
            &Event {
                event_id: "evt-ses".into(),
                sequence: 2,
                timestamp: Utc::now(),
                origin_daemon: "dmn-local".into(),
                payload: EventPayload::SessionStart { session_id: session_id.clone(), agent_id: sender.clone(), intent: None },
            },
        )
        .unwrap();

        let message_id = MessageId::new();
        apply(
            &conn,
            &Event {
                event_id: "evt-msg".into(),
                sequence: 3,
                timestamp: Utc::now(),
                origin_daemon: "dmn-local".into(),
                payload: EventPayload::MessageCreate {
                    message_id: message_id.clone(),
                    thread_id: None,
                    agent_id: sender.clone(),
                    authored_by: None,
                    disclosed: None,
                    session_id,
                    body: Body { format: "text".into(), content: "hello".into() },
                    scopes: vec![Scope::Agent(reader.as_str().to_string())],
                    refs: vec![],
                    reply_to: None,
                },
            },
        )
        .unwrap();

        let filter = MessageFilter {
            for_agent: None,
            unread_for_agent: Some(reader.as_str().to_string()),
            thread_id: None,
            scope: None,
            page: 0,
            page_size: 50,
        };
        let (rows, total) = list_messages(&conn, &filter).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows.len(), 1);

        conn.execute(
            "INSERT INTO message_reads (message_id, agent_id, session_id, read_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![message_id.as_str(), reader.as_str(), "ses-x", Utc::now().to_rfc3339()],
        )
        .unwrap();

        let (rows, _) = list_messages(&conn, &filter).unwrap();
        assert!(rows.is_empty());
    }
}
