// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! The error taxonomy surfaced by the State facade (and, from there, by
//! every JSON-RPC response) to callers.

use thiserror::Error;

/// Canonical error kinds. Every non-trivial failure path in the daemon ends
/// up as one of these six; handlers never invent new ones.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrumError {
    /// Schema or size violation in a request's arguments.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced entity (agent, session, group, message, thread, peer)
    /// does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness violation: duplicate `event_id` on ingest, a group-add
    /// that would close a cycle, a session re-start while the prior session
    /// is still active.
    #[error("conflict: {kind}: {detail}")]
    Conflict { kind: ConflictKind, detail: String },

    /// The request's context was cancelled or its deadline elapsed.
    #[error("canceled")]
    Canceled,

    /// Storage I/O failure or other unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// The write path is temporarily blocked (recovery in progress) or a
    /// rate/queue limit was exceeded.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Discriminates the flavor of [`ThrumError::Conflict`] so callers (and
/// tests asserting on `data.kind`) don't have to string-match the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    DuplicateEventId,
    Cycle,
    SessionActive,
    NameRoleCollision,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConflictKind::DuplicateEventId => "duplicate_event_id",
            ConflictKind::Cycle => "cycle",
            ConflictKind::SessionActive => "session_active",
            ConflictKind::NameRoleCollision => "name_role_collision",
        };
        write!(f, "{s}")
    }
}

impl ThrumError {
    /// The stable string tag carried as `data.kind` on JSON-RPC error
    /// responses (see `spec.md` §4.3 and §7).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            ThrumError::InvalidArgument(_) => "InvalidArgument",
            ThrumError::NotFound(_) => "NotFound",
            ThrumError::Conflict { .. } => "Conflict",
            ThrumError::Canceled => "Canceled",
            ThrumError::Internal(_) => "Internal",
            ThrumError::Unavailable(_) => "Unavailable",
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        ThrumError::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ThrumError::NotFound(msg.into())
    }

    pub fn conflict(kind: ConflictKind, detail: impl Into<String>) -> Self {
        ThrumError::Conflict { kind, detail: detail.into() }
    }
}

pub type Result<T> = std::result::Result<T, ThrumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_matches_taxonomy() {
        assert_eq!(ThrumError::Canceled.kind_tag(), "Canceled");
        assert_eq!(
            ThrumError::conflict(ConflictKind::Cycle, "A->B->A").kind_tag(),
            "Conflict"
        );
    }
}
