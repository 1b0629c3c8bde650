// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! thrum-storage: the append-only event log and its SQLite projection.

pub mod error;
pub mod event_log;
pub mod migration;
pub mod projection;

pub use error::{Result, StorageError};
pub use event_log::EventLog;
pub use migration::{Migration, MigrationError, MigrationRegistry, CURRENT_SCHEMA_VERSION};
pub use projection::{
    agent_count, find_group_id_by_name, group_members, list_agents, list_messages, message_count,
    open, open_in_memory, rebuild, unread_count, MessageFilter, MessageRow,
};
