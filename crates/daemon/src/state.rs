// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! The State facade: the single choke point through which every handler
//! reads and writes. Composes the append-only log with its SQLite
//! projection (§4.2, §6) and exposes a `write_event`/`query_*` surface so
//! handlers never touch either one directly.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thrum_core::{Event, EventPayload, ThrumError};
use thrum_storage::{projection, EventLog, Result as StorageResult};

/// Called after every successfully applied event, to fan out notifications
/// to subscribed connections. Registered once at startup by the
/// subscription manager.
pub type EventHook = Box<dyn Fn(&Event) + Send + Sync>;

pub struct State {
    pub daemon_id: String,
    log: EventLog,
    conn: Mutex<Connection>,
    next_sequence: AtomicU64,
    on_event_write: RwLock<Option<EventHook>>,
}

impl State {
    pub fn open(log_dir: &Path, projection_path: &Path, daemon_id: String) -> Result<Self, ThrumError> {
        let log = EventLog::open(log_dir).map_err(storage_err)?;
        let mut conn = projection::open(projection_path).map_err(storage_err)?;

        let events = log.read_all().map_err(storage_err)?;
        let max_in_db: i64 = conn
            .query_row("SELECT COALESCE(MAX(sequence), 0) FROM events", [], |row| row.get(0))
            .map_err(|e| ThrumError::Internal(e.to_string()))?;
        let missing: Vec<Event> = events.into_iter().filter(|e| e.sequence as i64 > max_in_db).collect();
        if !missing.is_empty() {
            tracing::warn!(count = missing.len(), "replaying events missing from projection (drift recovery)");
            let tx = conn.transaction().map_err(|e| ThrumError::Internal(e.to_string()))?;
            for event in &missing {
                projection::apply(&tx, event).map_err(storage_err)?;
            }
            tx.commit().map_err(|e| ThrumError::Internal(e.to_string()))?;
        }

        // Must start after the replayed tail, not the pre-replay max, or the
        // first local write after drift recovery reuses a sequence the
        // replay just reinserted.
        let next_sequence = missing.last().map(|e| e.sequence).unwrap_or(max_in_db as u64) + 1;

        Ok(Self {
            daemon_id,
            log,
            conn: Mutex::new(conn),
            next_sequence: AtomicU64::new(next_sequence.max(1)),
            on_event_write: RwLock::new(None),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory_for_test(log_dir: &Path, daemon_id: String) -> Result<Self, ThrumError> {
        let log = EventLog::open(log_dir).map_err(storage_err)?;
        let conn = projection::open_in_memory().map_err(storage_err)?;
        Ok(Self {
            daemon_id,
            log,
            conn: Mutex::new(conn),
            next_sequence: AtomicU64::new(1),
            on_event_write: RwLock::new(None),
        })
    }

    pub fn set_on_event_write(&self, hook: EventHook) {
        *self.on_event_write.write() = Some(hook);
    }

    /// Allocates a sequence number, appends to the durable log, applies to
    /// the projection, and fires the write hook, in that order: the log
    /// write is durable before the projection (and any subscriber) ever
    /// observes the event.
    pub fn write_event(&self, payload: EventPayload, sender_name: Option<&str>) -> Result<Event, ThrumError> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            event_id: format!("evt-{}", nanoid::nanoid!(20)),
            sequence,
            timestamp: Utc::now(),
            origin_daemon: self.daemon_id.clone(),
            payload,
        };

        self.log.append(&event, sender_name).map_err(storage_err)?;

        {
            let conn = self.conn.lock();
            projection::apply(&conn, &event).map_err(storage_err)?;
        }

        if let Some(hook) = self.on_event_write.read().as_ref() {
            hook(&event);
        }

        Ok(event)
    }

    /// Applies a remote event (already validated) without allocating a new
    /// local sequence number: sync-path writes keep the peer's numbering.
    pub fn apply_remote_event(&self, event: &Event) -> Result<(), ThrumError> {
        let conn = self.conn.lock();
        projection::apply(&conn, event).map_err(storage_err)?;
        drop(conn);
        if let Some(hook) = self.on_event_write.read().as_ref() {
            hook(event);
        }
        Ok(())
    }

    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> Result<T, ThrumError> {
        let conn = self.conn.lock();
        f(&conn).map_err(storage_err)
    }

    /// The full append-only log, in write order. Used by the git sync
    /// bridge, which diffs this against what's already committed on the
    /// `a-sync` branch rather than tracking its own cursor.
    pub fn read_all_events(&self) -> Result<Vec<Event>, ThrumError> {
        self.log.read_all().map_err(storage_err)
    }
}

pub fn storage_err(err: thrum_storage::StorageError) -> ThrumError {
    ThrumError::Internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_core::AgentId;

    fn test_state() -> (State, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = State::open_in_memory_for_test(&dir.path().join("log"), "dmn-test".into()).unwrap();
        (state, dir)
    }

    #[test]
    fn write_event_assigns_increasing_sequences() {
        let (state, _dir) = test_state();
        let e1 = state
            .write_event(
                EventPayload::AgentRegister {
                    agent_id: AgentId::new(),
                    name: "impl1".into(),
                    role: "implementer".into(),
                    module: "auth".into(),
                    display: None,
                    hostname: "host1".into(),
                    public_key: None,
                },
                None,
            )
            .unwrap();
        let e2 = state
            .write_event(
                EventPayload::AgentRegister {
                    agent_id: AgentId::new(),
                    name: "impl2".into(),
                    role: "implementer".into(),
                    module: "auth".into(),
                    display: None,
                    hostname: "host1".into(),
                    public_key: None,
                },
                None,
            )
            .unwrap();
        assert!(e2.sequence > e1.sequence);
    }

    #[test]
    fn write_event_fires_hook() {
        let (state, _dir) = test_state();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen2 = seen.clone();
        state.set_on_event_write(Box::new(move |_event| {
            seen2.store(true, std::sync::atomic::Ordering::SeqCst);
        }));
        state
            .write_event(
                EventPayload::AgentRegister {
                    agent_id: AgentId::new(),
                    name: "impl1".into(),
                    role: "implementer".into(),
                    module: "auth".into(),
                    display: None,
                    hostname: "host1".into(),
                    public_key: None,
                },
                None,
            )
            .unwrap();
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
    }
}
