// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Message read-state: at-most-once (message, agent) receipts.

use crate::agent::AgentId;
use crate::message::MessageId;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRead {
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub read_at: DateTime<Utc>,
}
