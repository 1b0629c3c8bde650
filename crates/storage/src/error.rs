// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Storage-layer errors, kept distinct from [`thrum_core::ThrumError`] so
//! the daemon decides how each one maps onto the canonical taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(#[from] crate::migration::MigrationError),

    #[error("mid-file corruption in {path}: {detail}")]
    Corrupt { path: String, detail: String },

    #[error("event id already present: {0}")]
    DuplicateEventId(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
