// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Receiver-driven pull: this daemon asks each peer for events after its
//! own checkpoint, validates what comes back, applies it, and advances.
//! §4.8: "sync is receiver-driven; a daemon pulls from peers it trusts
//! rather than accepting unsolicited pushes."

use crate::checkpoint;
use crate::error::SyncError;
use crate::rate_limiter::{Admission, RateLimiter};
use crate::registry::PeerRegistry;
use crate::validate::{self, SignaturePolicy};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use thrum_core::{Event, PeerDaemonId};
use thrum_storage::projection;
use tracing::{info, warn};

/// How a peer is actually reached. The daemon supplies the real
/// implementation (an RPC client over the wire framing); tests supply an
/// in-memory stand-in.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn pull(
        &self,
        peer: &thrum_core::Peer,
        after_sequence: u64,
        limit: u32,
    ) -> Result<PullResponse, SyncError>;
}

pub struct PullResponse {
    pub events: Vec<Event>,
    pub more: bool,
}

/// Outcome of one pull round against one peer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PullSummary {
    pub applied: u64,
    pub rejected: u64,
    pub rounds: u32,
}

const PULL_PAGE_SIZE: u32 = 200;
const MAX_ROUNDS_PER_CALL: u32 = 50;

/// Pulls from a single peer until it reports `more: false`, or until
/// `MAX_ROUNDS_PER_CALL` is hit (a single call never runs unbounded; the
/// caller's scheduler is what makes this periodic).
pub async fn pull_from_peer(
    conn: &Connection,
    transport: &dyn SyncTransport,
    limiter: &RateLimiter,
    peer_daemon_id: &PeerDaemonId,
    registry: &PeerRegistry,
) -> Result<PullSummary, SyncError> {
    let peer = registry.get(peer_daemon_id).ok_or_else(|| SyncError::UnknownPeer(peer_daemon_id.to_string()))?;

    let mut summary = PullSummary::default();
    let mut checkpoint = checkpoint::load_or_fresh(conn, peer_daemon_id, Utc::now())?;

    loop {
        if summary.rounds >= MAX_ROUNDS_PER_CALL {
            break;
        }

        match limiter.admit(peer_daemon_id.as_str()) {
            Admission::Allowed => {}
            Admission::RateLimited => return Err(SyncError::RateLimited(peer_daemon_id.to_string())),
            Admission::QueueSaturated => return Err(SyncError::RateLimited(peer_daemon_id.to_string())),
        }
        let response = transport.pull(&peer, checkpoint.last_synced_sequence, PULL_PAGE_SIZE).await;
        limiter.release();
        let response = response?;

        summary.rounds += 1;
        if response.events.is_empty() {
            break;
        }

        // §4.8.1: the checkpoint never advances past a rejected event's
        // sequence, or that event becomes unreachable on the next pull (its
        // sequence would already be behind the new `after_sequence` cursor).
        let mut lowest_rejected: Option<u64> = None;

        for event in response.events {
            let raw_len = serde_json::to_vec(&event).map(|v| v.len()).unwrap_or(usize::MAX);
            let known_ids = |_id: &str| true; // batch-local existence checked by the daemon's query layer
            let outcome = validate::validate(
                &event,
                raw_len,
                peer.public_key.as_deref(),
                None,
                SignaturePolicy::AllowUnsigned,
                &known_ids,
            );

            match outcome {
                Ok(()) => {
                    projection::apply(conn, &event)?;
                    summary.applied += 1;
                    let blocked = lowest_rejected.map(|r| event.sequence >= r).unwrap_or(false);
                    if !blocked {
                        checkpoint = checkpoint::advance(conn, peer_daemon_id, event.sequence, Utc::now())?;
                    }
                }
                Err(err) => {
                    warn!(peer = %peer_daemon_id, sequence = event.sequence, error = %err, "rejected event during pull");
                    summary.rejected += 1;
                    lowest_rejected = Some(lowest_rejected.map_or(event.sequence, |r| r.min(event.sequence)));
                }
            }
        }

        if !response.more {
            break;
        }
    }

    info!(peer = %peer_daemon_id, applied = summary.applied, rejected = summary.rejected, "pull round complete");
    Ok(summary)
}

/// Pulls from every registered peer in turn. A failure against one peer
/// (unreachable, rate-limited) doesn't stop the others.
pub async fn pull_from_all_peers(
    conn: &Connection,
    transport: &dyn SyncTransport,
    limiter: &RateLimiter,
    registry: &PeerRegistry,
) -> Vec<(PeerDaemonId, Result<PullSummary, SyncError>)> {
    let mut results = Vec::new();
    for peer in registry.list() {
        let outcome = pull_from_peer(conn, transport, limiter, &peer.peer_daemon_id, registry).await;
        results.push((peer.peer_daemon_id, outcome));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use thrum_core::{AgentId, EventPayload, Peer};

    struct FakeTransport {
        batches: Mutex<Vec<PullResponse>>,
    }

    #[async_trait]
    impl SyncTransport for FakeTransport {
        async fn pull(&self, _peer: &Peer, _after: u64, _limit: u32) -> Result<PullResponse, SyncError> {
            let mut batches = self.batches.lock();
            if batches.is_empty() {
                return Ok(PullResponse { events: vec![], more: false });
            }
            Ok(batches.remove(0))
        }
    }

    fn register_event(seq: u64) -> Event {
        Event {
            event_id: format!("evt-{seq}"),
            sequence: seq,
            timestamp: Utc::now(),
            origin_daemon: "dmn-peer".into(),
            payload: EventPayload::AgentRegister {
                agent_id: AgentId::new(),
                name: format!("agent-{seq}"),
                role: "implementer".into(),
                module: "auth".into(),
                display: None,
                hostname: "host1".into(),
                public_key: None,
            },
        }
    }

    fn sample_peer() -> Peer {
        Peer {
            peer_daemon_id: PeerDaemonId::new(),
            name: "peer-one".into(),
            address: "127.0.0.1:9000".into(),
            public_key: None,
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn pull_applies_events_and_advances_checkpoint() {
        let conn = projection::open_in_memory().unwrap();
        let registry = PeerRegistry::new();
        let peer = sample_peer();
        registry.add(peer.clone());

        let transport = FakeTransport {
            batches: Mutex::new(vec![
                PullResponse { events: vec![register_event(1), register_event(2)], more: false },
            ]),
        };
        let limiter = RateLimiter::with_defaults();

        let summary = pull_from_peer(&conn, &transport, &limiter, &peer.peer_daemon_id, &registry).await.unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected, 0);

        let cp = checkpoint::load(&conn, &peer.peer_daemon_id).unwrap().unwrap();
        assert_eq!(cp.last_synced_sequence, 2);
    }

    #[tokio::test]
    async fn checkpoint_does_not_advance_past_a_rejected_event_in_the_same_batch() {
        let conn = projection::open_in_memory().unwrap();
        let registry = PeerRegistry::new();
        let peer = sample_peer();
        registry.add(peer.clone());

        let mut bad = register_event(2);
        bad.event_id.clear();

        let transport = FakeTransport {
            batches: Mutex::new(vec![
                PullResponse { events: vec![register_event(1), bad, register_event(3)], more: false },
            ]),
        };
        let limiter = RateLimiter::with_defaults();

        let summary = pull_from_peer(&conn, &transport, &limiter, &peer.peer_daemon_id, &registry).await.unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected, 1);

        let cp = checkpoint::load(&conn, &peer.peer_daemon_id).unwrap().unwrap();
        assert_eq!(cp.last_synced_sequence, 1);
    }

    #[tokio::test]
    async fn unknown_peer_is_rejected() {
        let conn = projection::open_in_memory().unwrap();
        let registry = PeerRegistry::new();
        let transport = FakeTransport { batches: Mutex::new(vec![]) };
        let limiter = RateLimiter::with_defaults();

        let result = pull_from_peer(&conn, &transport, &limiter, &PeerDaemonId::new(), &registry).await;
        assert!(matches!(result, Err(SyncError::UnknownPeer(_))));
    }
}
