// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Persistence for per-peer sync checkpoints, bridging [`thrum_core::Checkpoint`]
//! to the projection's `checkpoints` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thrum_core::{Checkpoint, PeerDaemonId, SyncStatus};
use thrum_storage::{Result, StorageError};

fn status_tag(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Idle => "idle",
        SyncStatus::Syncing => "syncing",
        SyncStatus::Error => "error",
    }
}

fn status_from_tag(tag: &str) -> SyncStatus {
    match tag {
        "syncing" => SyncStatus::Syncing,
        "error" => SyncStatus::Error,
        _ => SyncStatus::Idle,
    }
}

/// Loads the checkpoint for `peer_daemon_id`, or `None` if the peer has
/// never synced.
pub fn load(conn: &Connection, peer_daemon_id: &PeerDaemonId) -> Result<Option<Checkpoint>> {
    let row = conn
        .query_row(
            "SELECT peer_daemon_id, last_synced_sequence, last_sync_timestamp, sync_status
             FROM checkpoints WHERE peer_daemon_id = ?1",
            params![peer_daemon_id.as_str()],
            |row| {
                let peer_id: String = row.get(0)?;
                let sequence: i64 = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let status: String = row.get(3)?;
                Ok((peer_id, sequence, timestamp, status))
            },
        )
        .optional()
        .map_err(StorageError::Sqlite)?;

    let Some((peer_id, sequence, timestamp, status)) = row else {
        return Ok(None);
    };

    let last_sync_timestamp: DateTime<Utc> = timestamp
        .parse()
        .map_err(|_| StorageError::Corrupt { path: "checkpoints".into(), detail: "bad timestamp".into() })?;

    Ok(Some(Checkpoint {
        peer_daemon_id: PeerDaemonId::from_string(peer_id),
        last_synced_sequence: sequence.max(0) as u64,
        last_sync_timestamp,
        sync_status: status_from_tag(&status),
    }))
}

/// Loads the checkpoint for `peer_daemon_id`, creating a fresh one at
/// sequence zero if none exists yet.
pub fn load_or_fresh(conn: &Connection, peer_daemon_id: &PeerDaemonId, now: DateTime<Utc>) -> Result<Checkpoint> {
    match load(conn, peer_daemon_id)? {
        Some(checkpoint) => Ok(checkpoint),
        None => Ok(Checkpoint::fresh(peer_daemon_id.clone(), now)),
    }
}

/// Lists every peer's checkpoint, for `health`'s sync summary.
pub fn list_all(conn: &Connection) -> Result<Vec<Checkpoint>> {
    let mut stmt = conn.prepare(
        "SELECT peer_daemon_id, last_synced_sequence, last_sync_timestamp, sync_status FROM checkpoints",
    )?;
    let rows = stmt.query_map([], |row| {
        let peer_id: String = row.get(0)?;
        let sequence: i64 = row.get(1)?;
        let timestamp: String = row.get(2)?;
        let status: String = row.get(3)?;
        Ok((peer_id, sequence, timestamp, status))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (peer_id, sequence, timestamp, status) = row?;
        let last_sync_timestamp: DateTime<Utc> = timestamp
            .parse()
            .map_err(|_| StorageError::Corrupt { path: "checkpoints".into(), detail: "bad timestamp".into() })?;
        out.push(Checkpoint {
            peer_daemon_id: PeerDaemonId::from_string(peer_id),
            last_synced_sequence: sequence.max(0) as u64,
            last_sync_timestamp,
            sync_status: status_from_tag(&status),
        });
    }
    Ok(out)
}

/// Persists `checkpoint`, overwriting any prior row for the same peer.
pub fn save(conn: &Connection, checkpoint: &Checkpoint) -> Result<()> {
    conn.execute(
        "INSERT INTO checkpoints (peer_daemon_id, last_synced_sequence, last_sync_timestamp, sync_status)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(peer_daemon_id) DO UPDATE SET
            last_synced_sequence = excluded.last_synced_sequence,
            last_sync_timestamp = excluded.last_sync_timestamp,
            sync_status = excluded.sync_status",
        params![
            checkpoint.peer_daemon_id.as_str(),
            checkpoint.last_synced_sequence as i64,
            checkpoint.last_sync_timestamp.to_rfc3339(),
            status_tag(checkpoint.sync_status),
        ],
    )
    .map_err(StorageError::Sqlite)?;
    Ok(())
}

/// Loads, advances past `sequence`, and saves the checkpoint in one step.
/// A rejected event (caller never calls this for it) leaves the checkpoint
/// exactly where it was, per §4.8.1.
pub fn advance(conn: &Connection, peer_daemon_id: &PeerDaemonId, sequence: u64, now: DateTime<Utc>) -> Result<Checkpoint> {
    let mut checkpoint = load_or_fresh(conn, peer_daemon_id, now)?;
    checkpoint.advance(sequence, now);
    save(conn, &checkpoint)?;
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_storage::projection;

    #[test]
    fn missing_checkpoint_loads_as_none() {
        let conn = projection::open_in_memory().unwrap();
        let peer_id = PeerDaemonId::new();
        assert!(load(&conn, &peer_id).unwrap().is_none());
    }

    #[test]
    fn advance_persists_and_never_regresses() {
        let conn = projection::open_in_memory().unwrap();
        let peer_id = PeerDaemonId::new();
        let now = Utc::now();

        advance(&conn, &peer_id, 5, now).unwrap();
        advance(&conn, &peer_id, 2, now).unwrap();
        let checkpoint = advance(&conn, &peer_id, 9, now).unwrap();

        assert_eq!(checkpoint.last_synced_sequence, 9);
        let reloaded = load(&conn, &peer_id).unwrap().unwrap();
        assert_eq!(reloaded.last_synced_sequence, 9);
    }
}
