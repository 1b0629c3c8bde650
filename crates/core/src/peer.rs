// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Remote daemons this daemon synchronizes event history with.

use crate::define_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_id! {
    pub struct PeerDaemonId("prd-");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub peer_daemon_id: PeerDaemonId,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Idle,
    Syncing,
    Error,
}

/// Per-peer watermark: the highest contiguous origin-local sequence number
/// this daemon has accepted from `peer_daemon_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub peer_daemon_id: PeerDaemonId,
    pub last_synced_sequence: u64,
    pub last_sync_timestamp: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl Checkpoint {
    pub fn fresh(peer_daemon_id: PeerDaemonId, now: DateTime<Utc>) -> Self {
        Self {
            peer_daemon_id,
            last_synced_sequence: 0,
            last_sync_timestamp: now,
            sync_status: SyncStatus::Idle,
        }
    }

    /// Advancing a checkpoint is only ever idempotent-forward: applying the
    /// same batch twice, or an out-of-order batch, never moves it backward.
    pub fn advance(&mut self, sequence: u64, now: DateTime<Utc>) {
        if sequence > self.last_synced_sequence {
            self.last_synced_sequence = sequence;
        }
        self.last_sync_timestamp = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_never_moves_backward() {
        let mut cp = Checkpoint::fresh(PeerDaemonId::new(), Utc::now());
        cp.advance(10, Utc::now());
        cp.advance(3, Utc::now());
        assert_eq!(cp.last_synced_sequence, 10);
        cp.advance(11, Utc::now());
        assert_eq!(cp.last_synced_sequence, 11);
    }
}
