// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Conversation threading.

use crate::agent::AgentId;
use crate::define_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_id! {
    /// Groups replies that share a root message.
    pub struct ThreadId("thr-");
}

/// Thread membership is stable once assigned: replies share `thread_id`
/// with their root, whether assigned implicitly (first reply) or explicitly
/// (`thread.create`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: ThreadId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: AgentId,
}
