// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Groups: named, fixed-point sets of agents, roles, and nested groups.

use crate::agent::AgentId;
use crate::define_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

define_id! {
    pub struct GroupId("grp-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Agent,
    Role,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_type: MemberType,
    pub member_value: String,
}

impl Member {
    pub fn agent(id: impl Into<String>) -> Self {
        Self { member_type: MemberType::Agent, member_value: id.into() }
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self { member_type: MemberType::Role, member_value: name.into() }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self { member_type: MemberType::Group, member_value: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: AgentId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub members: Vec<Member>,
}

/// Returns `Err(())` if adding `child` as a member of `group_id` would close
/// a cycle, given `resolve` to look up an existing group's direct members.
///
/// Walks the membership graph depth-first from `child`; if it reaches
/// `group_id` again, the add would make the group its own (indirect)
/// ancestor.
pub fn would_cycle(
    group_id: &str,
    child_group_id: &str,
    resolve: impl Fn(&str) -> Vec<Member>,
) -> bool {
    if group_id == child_group_id {
        return true;
    }
    let mut seen = HashSet::new();
    let mut stack = vec![child_group_id.to_string()];
    while let Some(current) = stack.pop() {
        if current == group_id {
            return true;
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        for member in resolve(&current) {
            if member.member_type == MemberType::Group {
                stack.push(member.member_value);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn direct_self_reference_is_a_cycle() {
        assert!(would_cycle("grp-a", "grp-a", |_| vec![]));
    }

    #[test]
    fn indirect_cycle_is_detected() {
        let mut graph: HashMap<String, Vec<Member>> = HashMap::new();
        graph.insert("grp-b".into(), vec![Member::group("grp-a")]);
        let resolve = |id: &str| graph.get(id).cloned().unwrap_or_default();
        assert!(would_cycle("grp-a", "grp-b", resolve));
    }

    #[test]
    fn disjoint_groups_do_not_cycle() {
        let mut graph: HashMap<String, Vec<Member>> = HashMap::new();
        graph.insert("grp-b".into(), vec![Member::agent("agt-1")]);
        let resolve = |id: &str| graph.get(id).cloned().unwrap_or_default();
        assert!(!would_cycle("grp-a", "grp-b", resolve));
    }
}
