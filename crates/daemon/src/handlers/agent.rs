// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Agent and session lifecycle handlers (§4.7 ambient completions).

use crate::handlers::require_params;
use crate::rpc::{ConnectionContext, SessionBinding};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use thrum_core::{Agent, AgentId, ConflictKind, EventPayload, SessionId, ThrumError};
use thrum_wire::method::{
    AgentIdParams, AgentRegisterParams, ContextClearParams, ContextSaveParams, SessionIdParams,
    SessionStartParams,
};

struct AgentRow {
    agent_id: AgentId,
    name: String,
    role: String,
    module: String,
    display: Option<String>,
    hostname: String,
    public_key: Option<String>,
    registered_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRow> {
    Ok(AgentRow {
        agent_id: AgentId::from_string(row.get::<_, String>("agent_id")?),
        name: row.get("name")?,
        role: row.get("role")?,
        module: row.get("module")?,
        display: row.get("display")?,
        hostname: row.get("hostname")?,
        public_key: row.get("public_key")?,
        registered_at: row.get("registered_at")?,
        last_seen_at: row.get("last_seen_at")?,
    })
}

fn agent_to_json(row: AgentRow) -> serde_json::Value {
    serde_json::json!({
        "agent_id": row.agent_id,
        "name": row.name,
        "role": row.role,
        "module": row.module,
        "display": row.display,
        "hostname": row.hostname,
        "public_key": row.public_key,
        "registered_at": row.registered_at,
        "last_seen_at": row.last_seen_at,
    })
}

pub fn register(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: AgentRegisterParams = require_params(params)?;
    if params.name.is_empty() {
        return Err(ThrumError::invalid_argument("agent name must not be empty"));
    }

    let existing_id = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT agent_id FROM agents WHERE name = ?1", [&params.name], |row| {
            row.get::<_, String>(0)
        })
        .optional()
    })?;

    if existing_id.is_none() {
        let roles = ctx.state.with_connection(|conn| {
            let agents = thrum_storage::list_agents(conn)?;
            Ok(agents.into_iter().map(|(_, _, role)| role).collect::<Vec<_>>())
        })?;
        Agent::validate_against_roles(&params.name, &roles)
            .map_err(|msg| ThrumError::conflict(ConflictKind::NameRoleCollision, msg))?;
    }

    // Re-registration (reconnect) reuses the agent's existing identity so
    // its sessions and message history stay attributed to one agent_id.
    let agent_id = existing_id.map(AgentId::from_string).unwrap_or_else(AgentId::new);

    let event = ctx.state.write_event(
        EventPayload::AgentRegister {
            agent_id,
            name: params.name,
            role: params.role,
            module: params.module,
            display: params.display,
            hostname: params.hostname.unwrap_or_else(|| "unknown".to_string()),
            public_key: params.public_key,
        },
        None,
    )?;

    let row = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT * FROM agents WHERE agent_id = ?1", [agent_id.as_str()], row_to_agent)
    })?;
    let _ = event;
    Ok(agent_to_json(row))
}

pub fn deregister(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: AgentIdParams = require_params(params)?;
    ctx.state.write_event(EventPayload::AgentDeregister { agent_id: params.agent_id }, None)?;
    Ok(serde_json::json!({}))
}

pub fn list(ctx: &ConnectionContext) -> Result<serde_json::Value, ThrumError> {
    let rows = ctx.state.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM agents WHERE deregistered_at IS NULL ORDER BY registered_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_agent)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })?;
    let agents: Vec<serde_json::Value> = rows.into_iter().map(agent_to_json).collect();
    Ok(serde_json::json!({ "agents": agents }))
}

pub fn session_start(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: SessionStartParams = require_params(params)?;

    let agent_name = ctx
        .state
        .with_connection(|conn| {
            conn.query_row(
                "SELECT name FROM agents WHERE agent_id = ?1 AND deregistered_at IS NULL",
                [params.agent_id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?
        .ok_or_else(|| ThrumError::not_found(format!("agent {} is not registered", params.agent_id)))?;

    let has_active = ctx.state.with_connection(|conn| {
        conn.query_row(
            "SELECT 1 FROM sessions WHERE agent_id = ?1 AND ended_at IS NULL",
            [params.agent_id.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()
    })?;
    if has_active.is_some() {
        return Err(ThrumError::conflict(
            ConflictKind::SessionActive,
            format!("agent {} already has an active session", params.agent_id),
        ));
    }

    let session_id = SessionId::new();
    ctx.state.write_event(
        EventPayload::SessionStart { session_id, agent_id: params.agent_id, intent: params.intent },
        Some(&agent_name),
    )?;

    ctx.bind_session(SessionBinding { session_id, agent_id: params.agent_id, agent_name: agent_name.clone() });

    Ok(serde_json::json!({ "session_id": session_id, "agent_id": params.agent_id, "agent_name": agent_name }))
}

pub fn session_heartbeat(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: SessionIdParams = require_params(params)?;
    ensure_session_exists(ctx, params.session_id)?;
    ctx.state.write_event(EventPayload::SessionHeartbeat { session_id: params.session_id }, None)?;
    Ok(serde_json::json!({}))
}

pub fn session_end(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: SessionIdParams = require_params(params)?;
    ensure_session_exists(ctx, params.session_id)?;
    ctx.state.write_event(EventPayload::SessionEnd { session_id: params.session_id }, None)?;

    if ctx.current_session().map(|b| b.session_id == params.session_id).unwrap_or(false) {
        ctx.clear_session();
    }
    Ok(serde_json::json!({}))
}

fn ensure_session_exists(ctx: &ConnectionContext, session_id: SessionId) -> Result<(), ThrumError> {
    let exists = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT 1 FROM sessions WHERE session_id = ?1", [session_id.as_str()], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
    })?;
    if exists.is_none() {
        return Err(ThrumError::not_found(format!("session {session_id} does not exist")));
    }
    Ok(())
}

pub fn context_save(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: ContextSaveParams = require_params(params)?;
    if params.key.is_empty() {
        return Err(ThrumError::invalid_argument("context key must not be empty"));
    }
    let size = serde_json::to_string(&params.value).map(|s| s.len()).unwrap_or(0);
    if size > thrum_core::MAX_BODY_BYTES {
        return Err(ThrumError::invalid_argument("context value exceeds size limit"));
    }
    ctx.state.write_event(
        EventPayload::ContextSave {
            session_id: params.session_id,
            agent_id: params.agent_id,
            key: params.key,
            value: params.value,
        },
        None,
    )?;
    Ok(serde_json::json!({}))
}

pub fn context_clear(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: ContextClearParams = require_params(params)?;
    ctx.state.write_event(
        EventPayload::ContextClear { session_id: params.session_id, agent_id: params.agent_id, key: params.key },
        None,
    )?;
    Ok(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;

    fn register(ctx: &ConnectionContext, name: &str) -> AgentId {
        let params = AgentRegisterParams {
            name: name.to_string(),
            role: "implementer".into(),
            module: "auth".into(),
            display: None,
            hostname: Some("host1".into()),
            public_key: None,
        };
        let result = register_fn(ctx, &params);
        AgentId::from_string(result["agent_id"].as_str().unwrap())
    }

    fn register_fn(ctx: &ConnectionContext, params: &AgentRegisterParams) -> serde_json::Value {
        super::register(ctx, Some(serde_json::to_value(params).unwrap())).unwrap()
    }

    #[test]
    fn register_then_list_shows_the_agent() {
        let (ctx, _dir) = test_ctx();
        register(&ctx, "impl1");
        let result = list(&ctx).unwrap();
        assert_eq!(result["agents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn re_registering_the_same_name_reuses_the_agent_id() {
        let (ctx, _dir) = test_ctx();
        let first = register(&ctx, "impl1");
        let second = register(&ctx, "impl1");
        assert_eq!(first, second);
        assert_eq!(list(&ctx).unwrap()["agents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn register_rejects_empty_name() {
        let (ctx, _dir) = test_ctx();
        let params = AgentRegisterParams {
            name: String::new(),
            role: "implementer".into(),
            module: "auth".into(),
            display: None,
            hostname: None,
            public_key: None,
        };
        let err = super::register(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::InvalidArgument(_)));
    }

    #[test]
    fn register_rejects_a_name_that_collides_with_an_existing_role() {
        let (ctx, _dir) = test_ctx();
        register(&ctx, "impl1");
        let params = AgentRegisterParams {
            name: "implementer".into(),
            role: "reviewer".into(),
            module: "auth".into(),
            display: None,
            hostname: Some("host1".into()),
            public_key: None,
        };
        let err = super::register(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::Conflict { kind: ConflictKind::NameRoleCollision, .. }));
    }

    #[test]
    fn session_start_fails_for_unregistered_agent() {
        let (ctx, _dir) = test_ctx();
        let params = SessionStartParams { agent_id: AgentId::new(), intent: None };
        let err = session_start(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::NotFound(_)));
    }

    #[test]
    fn session_start_binds_the_connection_and_rejects_a_second_active_session() {
        let (ctx, _dir) = test_ctx();
        let agent_id = register(&ctx, "impl1");
        let params = SessionStartParams { agent_id, intent: None };
        session_start(&ctx, Some(serde_json::to_value(&params).unwrap())).unwrap();
        assert_eq!(ctx.current_session().unwrap().agent_id, agent_id);

        let err = session_start(&ctx, Some(serde_json::to_value(&params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::Conflict { .. }));
    }

    #[test]
    fn session_end_clears_only_its_own_binding() {
        let (ctx, _dir) = test_ctx();
        let agent_id = register(&ctx, "impl1");
        let start_result =
            session_start(&ctx, Some(serde_json::to_value(SessionStartParams { agent_id, intent: None }).unwrap()))
                .unwrap();
        let session_id = SessionId::from_string(start_result["session_id"].as_str().unwrap());

        session_end(&ctx, Some(serde_json::json!({ "session_id": session_id }))).unwrap();
        assert!(ctx.current_session().is_err());
    }
}
