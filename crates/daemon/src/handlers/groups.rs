// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Group membership handlers (§4.7).

use crate::addressing::{expand_scope, reject_if_cycle};
use crate::handlers::require_params;
use crate::rpc::ConnectionContext;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use thrum_core::{EventPayload, GroupId, Member, Scope, ThrumError};
use thrum_wire::method::{GroupCreateParams, GroupIdParams, GroupMemberParams, GroupMembersParams};

struct GroupRow {
    group_id: GroupId,
    name: String,
    description: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        group_id: GroupId::from_string(row.get::<_, String>("group_id")?),
        name: row.get("name")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn group_to_json(row: GroupRow) -> serde_json::Value {
    serde_json::json!({
        "group_id": row.group_id,
        "name": row.name,
        "description": row.description,
        "created_by": row.created_by,
        "created_at": row.created_at,
        "updated_at": row.updated_at,
    })
}

fn ensure_group_exists(ctx: &ConnectionContext, group_id: &str) -> Result<(), ThrumError> {
    let exists = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT 1 FROM groups WHERE group_id = ?1 AND deleted_at IS NULL", [group_id], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
    })?;
    if exists.is_none() {
        return Err(ThrumError::not_found(format!("group {group_id} does not exist")));
    }
    Ok(())
}

/// Runs `reject_if_cycle` against the projection, surfacing its
/// `ThrumError` through the `with_connection` closure boundary.
fn check_no_cycle(ctx: &ConnectionContext, group_id: &str, member: &Member) -> Result<(), ThrumError> {
    let checked: Result<(), ThrumError> =
        ctx.state.with_connection(|conn| Ok(reject_if_cycle(conn, group_id, member)))?;
    checked
}

pub fn create(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: GroupCreateParams = require_params(params)?;
    if params.name.is_empty() {
        return Err(ThrumError::invalid_argument("group name must not be empty"));
    }
    let binding = ctx.current_session()?;

    let group_id = GroupId::new();
    ctx.state.write_event(
        EventPayload::GroupCreate {
            group_id,
            name: params.name,
            description: params.description,
            created_by: binding.agent_id,
        },
        Some(&binding.agent_name),
    )?;

    for member in params.members {
        check_no_cycle(ctx, group_id.as_str(), &member)?;
        ctx.state.write_event(EventPayload::GroupMemberAdd { group_id, member }, Some(&binding.agent_name))?;
    }

    let row = ctx.state.with_connection(|conn| {
        conn.query_row("SELECT * FROM groups WHERE group_id = ?1", [group_id.as_str()], row_to_group)
    })?;
    Ok(group_to_json(row))
}

pub fn add(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: GroupMemberParams = require_params(params)?;
    ensure_group_exists(ctx, params.group_id.as_str())?;
    let binding = ctx.current_session()?;

    check_no_cycle(ctx, params.group_id.as_str(), &params.member)?;

    ctx.state.write_event(
        EventPayload::GroupMemberAdd { group_id: params.group_id, member: params.member },
        Some(&binding.agent_name),
    )?;
    Ok(serde_json::json!({}))
}

pub fn remove(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: GroupMemberParams = require_params(params)?;
    ensure_group_exists(ctx, params.group_id.as_str())?;
    let binding = ctx.current_session()?;

    ctx.state.write_event(
        EventPayload::GroupMemberRemove { group_id: params.group_id, member: params.member },
        Some(&binding.agent_name),
    )?;
    Ok(serde_json::json!({}))
}

pub fn list(ctx: &ConnectionContext) -> Result<serde_json::Value, ThrumError> {
    let rows = ctx.state.with_connection(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM groups WHERE deleted_at IS NULL ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], row_to_group)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })?;
    let groups: Vec<serde_json::Value> = rows.into_iter().map(group_to_json).collect();
    Ok(serde_json::json!({ "groups": groups }))
}

pub fn members(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: GroupMembersParams = require_params(params)?;
    ensure_group_exists(ctx, params.group_id.as_str())?;

    let names = if params.expand {
        let expanded: Result<Vec<String>, ThrumError> = ctx.state.with_connection(|conn| {
            Ok(expand_scope(conn, &Scope::Group(params.group_id.as_str().to_string())).map(|(names, _)| names))
        })?;
        expanded?
    } else {
        let members = ctx.state.with_connection(|conn| thrum_storage::group_members(conn, params.group_id.as_str()))?;
        members.into_iter().map(|m| m.member_value).collect()
    };

    Ok(serde_json::json!({ "members": names }))
}

pub fn delete(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: GroupIdParams = require_params(params)?;
    ensure_group_exists(ctx, params.group_id.as_str())?;
    ctx.state.write_event(EventPayload::GroupDelete { group_id: params.group_id }, None)?;
    Ok(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SessionBinding;
    use crate::test_support::test_ctx;
    use thrum_core::{AgentId, SessionId};

    fn with_session(ctx: &ConnectionContext) {
        ctx.bind_session(SessionBinding {
            session_id: SessionId::new(),
            agent_id: AgentId::new(),
            agent_name: "impl1".into(),
        });
    }

    #[test]
    fn create_requires_a_bound_session() {
        let (ctx, _dir) = test_ctx();
        let params = GroupCreateParams { name: "squad".into(), description: None, members: vec![] };
        let err = create(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap_err();
        assert!(matches!(err, ThrumError::InvalidArgument(_)));
    }

    #[test]
    fn create_then_list_shows_the_group() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx);
        let params = GroupCreateParams { name: "squad".into(), description: None, members: vec![] };
        let created = create(&ctx, Some(serde_json::to_value(params).unwrap())).unwrap();
        assert_eq!(created["name"], "squad");
        assert_eq!(list(&ctx).unwrap()["groups"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn add_then_members_lists_the_new_member() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx);
        let created = create(
            &ctx,
            Some(serde_json::to_value(GroupCreateParams { name: "squad".into(), description: None, members: vec![] }).unwrap()),
        )
        .unwrap();
        let group_id = GroupId::from_string(created["group_id"].as_str().unwrap());

        add(&ctx, Some(serde_json::json!({ "group_id": group_id, "member": Member::agent("impl2") }))).unwrap();

        let result = members(&ctx, Some(serde_json::json!({ "group_id": group_id, "expand": false }))).unwrap();
        let names: Vec<String> = result["members"].as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        assert_eq!(names, vec!["impl2"]);
    }

    #[test]
    fn add_rejects_a_self_referential_group_member() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx);
        let created = create(
            &ctx,
            Some(serde_json::to_value(GroupCreateParams { name: "squad".into(), description: None, members: vec![] }).unwrap()),
        )
        .unwrap();
        let group_id = GroupId::from_string(created["group_id"].as_str().unwrap());

        let err = add(&ctx, Some(serde_json::json!({ "group_id": group_id, "member": Member::group(group_id.as_str()) })))
            .unwrap_err();
        assert!(matches!(err, ThrumError::Conflict { kind: thrum_core::ConflictKind::Cycle, .. }));
    }

    #[test]
    fn operations_on_an_unknown_group_are_not_found() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx);
        let unknown = GroupId::new();
        let err = members(&ctx, Some(serde_json::json!({ "group_id": unknown, "expand": false }))).unwrap_err();
        assert!(matches!(err, ThrumError::NotFound(_)));
    }

    #[test]
    fn delete_then_list_no_longer_shows_the_group() {
        let (ctx, _dir) = test_ctx();
        with_session(&ctx);
        let created = create(
            &ctx,
            Some(serde_json::to_value(GroupCreateParams { name: "squad".into(), description: None, members: vec![] }).unwrap()),
        )
        .unwrap();
        let group_id = GroupId::from_string(created["group_id"].as_str().unwrap());

        delete(&ctx, Some(serde_json::json!({ "group_id": group_id }))).unwrap();
        assert!(list(&ctx).unwrap()["groups"].as_array().unwrap().is_empty());
    }
}
