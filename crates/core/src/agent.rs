// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Agent identity.

use crate::define_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_id! {
    /// Globally unique identity handle for a registered agent.
    pub struct AgentId("agt-");
}

/// A registered caller identity, typically an AI coding session.
///
/// Keyed by [`AgentId`]; re-registration via `agent.register` is idempotent
/// and updates every field below except `agent_id` and `registered_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    /// Display name, unique among agents and distinct from every role string.
    pub name: String,
    pub role: String,
    pub module: String,
    pub display: Option<String>,
    pub hostname: String,
    /// Base64-encoded Ed25519 public key, present when this agent's daemon
    /// signs sync events on its behalf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Agent {
    /// `name` must never collide with any role string (§3 invariant).
    pub fn validate_against_roles(name: &str, roles: &[String]) -> Result<(), String> {
        if roles.iter().any(|r| r == name) {
            return Err(format!("agent name {name:?} collides with an existing role"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_role_collision_rejected() {
        let roles = vec!["reviewer".to_string(), "implementer".to_string()];
        assert!(Agent::validate_against_roles("reviewer", &roles).is_err());
        assert!(Agent::validate_against_roles("impl1", &roles).is_ok());
    }
}
