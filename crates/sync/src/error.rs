// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Sync-engine errors. Rejections from validation are counted by reason
//! rather than surfaced as hard failures (§4.8.1): a rejected event drops
//! out of the batch but never poisons its siblings or the connection.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("event exceeds max size")]
    TooLarge,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown event type: {0}")]
    UnknownType(String),
    #[error("signature verification failed")]
    BadSignature,
    #[error("timestamp too far in the future")]
    TimestampOutOfRange,
    #[error("message content exceeds 100 KB")]
    ContentTooLarge,
    #[error("referenced entity not yet introduced: {0}")]
    UnknownReference(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] thrum_storage::StorageError),
    #[error("peer not registered: {0}")]
    UnknownPeer(String),
    #[error("rate limit exceeded for peer {0}")]
    RateLimited(String),
    #[error("peer {0} unreachable: {1}")]
    Transport(String, String),
}
