// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Periodic sync sweep (§4.8): on an interval, pull from every registered
//! peer over the wire. A lightweight `sync.notify` hint is sent
//! fire-and-forget after local writes so a peer doesn't have to wait out
//! the full interval to notice new events exist.

use crate::state::State;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use thrum_core::Peer;
use thrum_sync::{pull_from_all_peers, PeerRegistry, PullResponse, RateLimiter, SyncError, SyncTransport};
use thrum_wire::method::{self, SyncNotifyParams, SyncPullParams, SyncPullResult};
use thrum_wire::{Request, RequestId};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// [`SyncTransport`] that reaches a peer over its WebSocket listener,
/// sending one `sync.pull` call per connection and closing it.
pub struct WireTransport;

fn transport_error(peer: &Peer, context: &str, err: impl std::fmt::Display) -> SyncError {
    SyncError::Transport(peer.peer_daemon_id.to_string(), format!("{context}: {err}"))
}

#[async_trait::async_trait]
impl SyncTransport for WireTransport {
    async fn pull(&self, peer: &Peer, after_sequence: u64, limit: u32) -> Result<PullResponse, SyncError> {
        let url = format!("ws://{}", peer.address);
        let (mut ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| SyncError::Transport(peer.peer_daemon_id.to_string(), e.to_string()))?;

        let request = Request {
            jsonrpc: "2.0".to_string(),
            method: method::SYNC_PULL.to_string(),
            params: Some(
                serde_json::to_value(SyncPullParams { after_sequence, limit })
                    .map_err(|e| SyncError::Transport(peer.peer_daemon_id.to_string(), e.to_string()))?,
            ),
            id: Some(RequestId::Number(1)),
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| SyncError::Transport(peer.peer_daemon_id.to_string(), e.to_string()))?;
        ws.send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| transport_error(peer, "send failed", e))?;

        let reply = match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(_)) => return Err(SyncError::Transport(peer.peer_daemon_id.to_string(), "unexpected frame type".into())),
            Some(Err(e)) => return Err(transport_error(peer, "recv failed", e)),
            None => return Err(SyncError::Transport(peer.peer_daemon_id.to_string(), "connection closed before reply".into())),
        };

        let response: thrum_wire::Response = serde_json::from_str(&reply)
            .map_err(|e| SyncError::Transport(peer.peer_daemon_id.to_string(), e.to_string()))?;
        let result = response
            .result
            .ok_or_else(|| SyncError::Transport(peer.peer_daemon_id.to_string(), "peer returned an error response".to_string()))?;
        let result: SyncPullResult = serde_json::from_value(result)
            .map_err(|e| SyncError::Transport(peer.peer_daemon_id.to_string(), e.to_string()))?;

        Ok(PullResponse { events: result.events, more: result.more })
    }
}

async fn notify_peer(peer: &Peer, hint: &SyncNotifyParams) {
    let url = format!("ws://{}", peer.address);
    let Ok((mut ws, _)) = tokio_tungstenite::connect_async(&url).await else {
        debug!(peer = %peer.peer_daemon_id, "notify skipped, peer unreachable");
        return;
    };
    let request = Request {
        jsonrpc: "2.0".to_string(),
        method: method::SYNC_NOTIFY.to_string(),
        params: serde_json::to_value(hint).ok(),
        id: None,
    };
    if let Ok(text) = serde_json::to_string(&request) {
        let _ = ws.send(WsMessage::Text(text.into())).await;
    }
}

/// Runs the pull sweep on `crate::env::sync_interval()` and drains
/// `notify_rx` to forward fire-and-forget hints, until `shutdown` fires.
pub async fn run(
    state: Arc<State>,
    peers: Arc<PeerRegistry>,
    rate_limiter: Arc<RateLimiter>,
    mut notify_rx: mpsc::UnboundedReceiver<SyncNotifyParams>,
    shutdown: CancellationToken,
) {
    let transport = WireTransport;
    let mut ticker = tokio::time::interval(crate::env::sync_interval());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                // `pull_from_all_peers` is async (it awaits the network round
                // trip per peer) but must run with the projection `Connection`
                // held for its duration. `block_in_place` hands this thread's
                // other ready tasks to the rest of the (multi-threaded) runtime
                // while we drive the nested future to completion here.
                let result = state.with_connection(|conn| {
                    Ok(tokio::task::block_in_place(|| {
                        tokio::runtime::Handle::current()
                            .block_on(pull_from_all_peers(conn, &transport, &rate_limiter, &peers))
                    }))
                });
                match result {
                    Ok(summaries) => {
                        for (peer_id, outcome) in summaries {
                            match outcome {
                                Ok(summary) if summary.applied > 0 => {
                                    debug!(peer = %peer_id, applied = summary.applied, rejected = summary.rejected, "sync sweep applied events");
                                }
                                Ok(_) => {}
                                Err(e) => warn!(peer = %peer_id, error = %e, "sync sweep failed"),
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "sync sweep could not open storage"),
                }
            }
            Some(hint) = notify_rx.recv() => {
                for peer in peers.list() {
                    notify_peer(&peer, &hint).await;
                }
            }
        }
    }
}
