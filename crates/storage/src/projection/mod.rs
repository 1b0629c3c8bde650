// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! The SQLite projection: derived, rebuildable read state (§4.2, §6).

mod apply;
mod query;
mod schema;

pub use apply::apply;
pub use query::{
    agent_count, find_group_id_by_name, group_members, list_agents, list_messages, message_count,
    unread_count, MessageFilter, MessageRow,
};

use crate::error::Result;
use crate::migration::{MigrationRegistry, CURRENT_SCHEMA_VERSION};
use rusqlite::Connection;
use std::path::Path;
use thrum_core::Event;

/// Opens (creating if absent) the projection database at `path`, turns on
/// WAL mode and foreign keys, and brings the schema up to
/// [`CURRENT_SCHEMA_VERSION`].
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(schema::SCHEMA_V1)?;

    let current: Option<u32> =
        conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)).ok();
    let registry = MigrationRegistry::standard();
    match current {
        None => {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [CURRENT_SCHEMA_VERSION])?;
        }
        Some(v) if v < CURRENT_SCHEMA_VERSION => {
            let migrated = registry.migrate(conn, v)?;
            conn.execute("UPDATE schema_version SET version = ?1", [migrated])?;
        }
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            registry.migrate(conn, v)?; // always errors: TooNew
        }
        _ => {}
    }
    Ok(())
}

/// Truncates every projection table and replays `events` in sequence
/// order. Idempotent: running it twice on the same log yields identical
/// row sets (§8 invariant 1).
pub fn rebuild(conn: &mut Connection, events: &[Event]) -> Result<()> {
    let mut ordered = events.to_vec();
    ordered.sort_by_key(|e| e.sequence);

    let tx = conn.transaction()?;
    // checkpoints are sync bookkeeping, not derived from the event log
    // itself (no event ever replays into that table), so a rebuild leaves
    // them alone rather than wiping a peer's sync progress.
    for table in [
        "message_reads",
        "group_members",
        "messages",
        "groups",
        "threads",
        "sessions",
        "agents",
        "events",
    ] {
        tx.execute(&format!("DELETE FROM {table}"), [])?;
    }
    for event in &ordered {
        apply::apply(&tx, event)?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use thrum_core::{AgentId, EventPayload};

    fn agent_register_event(seq: u64, name: &str) -> Event {
        Event {
            event_id: format!("evt-{seq}"),
            sequence: seq,
            timestamp: Utc::now(),
            origin_daemon: "dmn-local".into(),
            payload: EventPayload::AgentRegister {
                agent_id: AgentId::new(),
                name: name.into(),
                role: "implementer".into(),
                module: "auth".into(),
                display: None,
                hostname: "host1".into(),
                public_key: None,
            },
        }
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut conn = open_in_memory().unwrap();
        let events = vec![agent_register_event(1, "impl1"), agent_register_event(2, "impl2")];
        rebuild(&mut conn, &events).unwrap();
        let first = agent_count(&conn).unwrap();
        rebuild(&mut conn, &events).unwrap();
        let second = agent_count(&conn).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 2);
    }

    #[test]
    fn replaying_same_event_twice_does_not_duplicate() {
        let conn = open_in_memory().unwrap();
        let event = agent_register_event(1, "impl1");
        apply::apply(&conn, &event).unwrap();
        apply::apply(&conn, &event).unwrap();
        assert_eq!(agent_count(&conn).unwrap(), 1);
    }
}
