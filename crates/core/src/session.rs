// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Session lifecycle: start -> heartbeats -> end.

use crate::agent::AgentId;
use crate::define_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_id! {
    /// A bounded period of agent activity; scopes subscriptions and reads.
    pub struct SessionId("ses-");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
    pub intent: Option<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ended_session_is_not_active() {
        let mut s = Session {
            session_id: SessionId::new(),
            agent_id: AgentId::new(),
            started_at: Utc::now(),
            ended_at: None,
            last_seen_at: Utc::now(),
            intent: None,
        };
        assert!(s.is_active());
        s.ended_at = Some(Utc::now());
        assert!(!s.is_active());
    }
}
