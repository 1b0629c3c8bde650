// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Resolves a `message.send` `to` string into scopes, and expands `@role`
//! and `@group` scopes into the concrete agent names a message actually
//! fans out to (§3, §4.5).
//!
//! Syntax: `@everyone`, `@agent-name`, `@role:name`, `@group:name`.

use rusqlite::Connection;
use thrum_core::{would_cycle, Member, MemberType, Scope, ThrumError};
use thrum_wire::Warning;

/// Parses one `to` token into a [`Scope`]. `message.send` accepts a single
/// `to`; richer multi-scope addressing goes through the `scopes` field
/// directly.
///
/// An unprefixed token (`@reviewer`) is resolved against the roster by
/// priority — group name, then role, then agent name — per the addressing
/// rules' items 2-4. The explicit `role:`/`group:` prefixes bypass that
/// lookup and bind directly to the named role or group id.
pub fn parse_to(conn: &Connection, to: &str) -> Result<Scope, ThrumError> {
    let Some(rest) = to.strip_prefix('@') else {
        return Err(ThrumError::invalid_argument(format!("address must start with '@': {to:?}")));
    };
    if rest == "everyone" {
        return Ok(Scope::Everyone);
    }
    if let Some(role) = rest.strip_prefix("role:") {
        if role.is_empty() {
            return Err(ThrumError::invalid_argument("empty role address"));
        }
        return Ok(Scope::Role(role.to_string()));
    }
    if let Some(group) = rest.strip_prefix("group:") {
        if group.is_empty() {
            return Err(ThrumError::invalid_argument("empty group address"));
        }
        return Ok(Scope::Group(group.to_string()));
    }
    if rest.is_empty() {
        return Err(ThrumError::invalid_argument("empty agent address"));
    }
    resolve_unprefixed(conn, rest)
}

/// Resolves a bare `@token` against the roster: group name first, then
/// role, then agent name, falling back to a direct agent scope so a
/// not-yet-registered name still reaches `expand_scope`'s own NotFound path.
fn resolve_unprefixed(conn: &Connection, token: &str) -> Result<Scope, ThrumError> {
    if let Some(group_id) =
        thrum_storage::find_group_id_by_name(conn, token).map_err(crate::state::storage_err)?
    {
        return Ok(Scope::Group(group_id));
    }
    let agents = thrum_storage::list_agents(conn).map_err(crate::state::storage_err)?;
    if agents.iter().any(|(_, _, role)| role == token) {
        return Ok(Scope::Role(token.to_string()));
    }
    Ok(Scope::Agent(token.to_string()))
}

/// Names of agents a single scope currently resolves to, plus any warning
/// worth surfacing to the sender (role fanout).
pub fn expand_scope(conn: &Connection, scope: &Scope) -> Result<(Vec<String>, Option<Warning>), ThrumError> {
    match scope {
        Scope::Agent(name) => Ok((vec![name.clone()], None)),
        Scope::Everyone => {
            let agents = thrum_storage::list_agents(conn).map_err(crate::state::storage_err)?;
            Ok((agents.into_iter().map(|(_, name, _)| name).collect(), None))
        }
        Scope::Role(role) => {
            let agents = thrum_storage::list_agents(conn).map_err(crate::state::storage_err)?;
            let matched: Vec<String> =
                agents.into_iter().filter(|(_, _, r)| r == role).map(|(_, name, _)| name).collect();
            let warning = if matched.len() > 1 { Some(Warning::role_fanout(role, matched.len())) } else { None };
            Ok((matched, warning))
        }
        Scope::Group(group_id) => {
            let names = expand_group_to_agent_names(conn, group_id)?;
            Ok((names, None))
        }
    }
}

/// Recursively expands a group to the agent names it ultimately contains,
/// resolving nested groups and `Role` members against the current roster.
fn expand_group_to_agent_names(conn: &Connection, group_id: &str) -> Result<Vec<String>, ThrumError> {
    let mut out = Vec::new();
    let mut stack = vec![group_id.to_string()];
    let mut visited = std::collections::HashSet::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let members = thrum_storage::group_members(conn, &current).map_err(crate::state::storage_err)?;
        for member in members {
            match member.member_type {
                MemberType::Agent => out.push(member.member_value),
                MemberType::Group => stack.push(member.member_value),
                MemberType::Role => {
                    let agents = thrum_storage::list_agents(conn).map_err(crate::state::storage_err)?;
                    out.extend(agents.into_iter().filter(|(_, _, r)| *r == member.member_value).map(|(_, n, _)| n));
                }
            }
        }
    }
    Ok(out)
}

/// Rejects a `group.member.add` that would close a membership cycle,
/// looking up each candidate group's direct members from the projection.
pub fn reject_if_cycle(conn: &Connection, group_id: &str, member: &Member) -> Result<(), ThrumError> {
    if member.member_type != MemberType::Group {
        return Ok(());
    }
    let resolve = |id: &str| thrum_storage::group_members(conn, id).unwrap_or_default();
    if would_cycle(group_id, &member.member_value, resolve) {
        return Err(ThrumError::conflict(
            thrum_core::ConflictKind::Cycle,
            format!("adding {} to {group_id} would close a membership cycle", member.member_value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use thrum_core::{AgentId, Event, EventPayload, GroupId};

    fn register(conn: &Connection, name: &str, role: &str, seq: u64) -> AgentId {
        let agent_id = AgentId::new();
        thrum_storage::projection::apply(
            conn,
            &Event {
                event_id: format!("evt-{name}"),
                sequence: seq,
                timestamp: Utc::now(),
                origin_daemon: "dmn-local".into(),
                payload: EventPayload::AgentRegister {
                    agent_id: agent_id.clone(),
                    name: name.into(),
                    role: role.into(),
                    module: "auth".into(),
                    display: None,
                    hostname: "host1".into(),
                    public_key: None,
                },
            },
        )
        .unwrap();
        agent_id
    }

    fn create_group(conn: &Connection, name: &str, created_by: &AgentId, seq: u64) -> GroupId {
        let group_id = GroupId::new();
        thrum_storage::projection::apply(
            conn,
            &Event {
                event_id: format!("evt-group-{name}"),
                sequence: seq,
                timestamp: Utc::now(),
                origin_daemon: "dmn-local".into(),
                payload: EventPayload::GroupCreate {
                    group_id,
                    name: name.into(),
                    description: None,
                    created_by: created_by.clone(),
                },
            },
        )
        .unwrap();
        group_id
    }

    #[test]
    fn parses_everyone() {
        let conn = thrum_storage::open_in_memory().unwrap();
        assert_eq!(parse_to(&conn, "@everyone").unwrap(), Scope::Everyone);
    }

    #[test]
    fn parses_role_and_group() {
        let conn = thrum_storage::open_in_memory().unwrap();
        assert_eq!(parse_to(&conn, "@role:reviewer").unwrap(), Scope::Role("reviewer".into()));
        assert_eq!(parse_to(&conn, "@group:qa").unwrap(), Scope::Group("qa".into()));
    }

    #[test]
    fn parses_bare_agent_name_when_no_group_or_role_matches() {
        let conn = thrum_storage::open_in_memory().unwrap();
        register(&conn, "impl1", "implementer", 1);
        assert_eq!(parse_to(&conn, "@impl1").unwrap(), Scope::Agent("impl1".into()));
    }

    #[test]
    fn unprefixed_token_prefers_a_matching_group_name_over_a_role_or_agent() {
        let conn = thrum_storage::open_in_memory().unwrap();
        let creator = register(&conn, "reviewer", "implementer", 1);
        let group_id = create_group(&conn, "reviewer", &creator, 2);
        assert_eq!(parse_to(&conn, "@reviewer").unwrap(), Scope::Group(group_id.as_str().to_string()));
    }

    #[test]
    fn unprefixed_token_falls_back_to_a_matching_role_when_no_group_matches() {
        let conn = thrum_storage::open_in_memory().unwrap();
        register(&conn, "impl1", "reviewer", 1);
        register(&conn, "impl2", "reviewer", 2);
        assert_eq!(parse_to(&conn, "@reviewer").unwrap(), Scope::Role("reviewer".into()));
    }

    #[test]
    fn missing_at_prefix_is_rejected() {
        let conn = thrum_storage::open_in_memory().unwrap();
        assert!(parse_to(&conn, "impl1").is_err());
    }
}
