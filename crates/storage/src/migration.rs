// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Forward-only schema migrations, driven by a `schema_version` row (§4.2).

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("database schema version {0} is newer than this build supports ({1})")]
    TooNew(u32, u32),
    #[error("no migration path from v{0} to v{1}")]
    NoPath(u32, u32),
    #[error("migration v{0}->v{1} failed: {2}")]
    Failed(u32, u32, String),
}

/// One forward step, `source_version` -> `target_version`. Implementations
/// run arbitrary DDL/DML against `conn`; a post-condition check belongs
/// inside `migrate` itself (return `Err` if the check fails).
pub trait Migration {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, conn: &Connection) -> Result<(), MigrationError>;
}

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Ordered set of migrations; applied one hop at a time until the database
/// reaches [`CURRENT_SCHEMA_VERSION`].
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    /// The full registry this build ships, in source-version order.
    pub fn standard() -> Self {
        Self::new()
    }

    pub fn migrate(&self, conn: &Connection, from: u32) -> Result<u32, MigrationError> {
        if from > CURRENT_SCHEMA_VERSION {
            return Err(MigrationError::TooNew(from, CURRENT_SCHEMA_VERSION));
        }
        let mut version = from;
        while version < CURRENT_SCHEMA_VERSION {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(version, CURRENT_SCHEMA_VERSION))?;
            step.migrate(conn)
                .map_err(|e| MigrationError::Failed(step.source_version(), step.target_version(), e.to_string()))?;
            version = step.target_version();
        }
        Ok(version)
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOp;
    impl Migration for NoOp {
        fn source_version(&self) -> u32 {
            0
        }
        fn target_version(&self) -> u32 {
            1
        }
        fn migrate(&self, _conn: &Connection) -> Result<(), MigrationError> {
            Ok(())
        }
    }

    #[test]
    fn same_version_is_a_noop() {
        let registry = MigrationRegistry::new();
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(registry.migrate(&conn, CURRENT_SCHEMA_VERSION).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn too_new_is_rejected() {
        let registry = MigrationRegistry::new();
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(registry.migrate(&conn, 99), Err(MigrationError::TooNew(99, CURRENT_SCHEMA_VERSION)));
    }

    #[test]
    fn missing_hop_is_reported() {
        let mut registry = MigrationRegistry::new();
        registry.migrations.push(Box::new(NoOp));
        let conn = Connection::open_in_memory().unwrap();
        // from=0 would need a 1->CURRENT hop too if CURRENT > 1; with
        // CURRENT_SCHEMA_VERSION == 1 this just succeeds via NoOp.
        assert_eq!(registry.migrate(&conn, 0).unwrap(), 1);
    }
}
