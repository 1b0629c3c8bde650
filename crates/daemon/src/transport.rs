// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Unix socket and WebSocket listeners (§4.5). Both feed the same
//! [`rpc::ConnectionContext`] and [`rpc::dispatch`] core; only how bytes
//! enter and leave the process differs.
//!
//! Grounded on the teacher's dual Unix+TCP `Listener`, generalized from TCP
//! to WebSocket per `spec.md` §4.5.

use crate::rpc::{self, ConnectionContext};
use crate::state::State;
use crate::subscriptions::SubscriptionRegistry;
use futures_util::{SinkExt, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thrum_sync::{PeerRegistry, RateLimiter};
use thrum_wire::{framing, ErrorObject, Incoming, Response};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How often a connection's writer checks its own subscriptions for queued
/// notifications. A simplification of the teacher's per-outbox mpsc task:
/// here one poll loop serves every subscription a connection owns.
const PUSH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared dependencies every accepted connection needs to build its own
/// [`ConnectionContext`].
#[derive(Clone)]
pub struct Shared {
    pub state: Arc<State>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub peers: Arc<PeerRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl Shared {
    fn new_context(&self) -> ConnectionContext {
        ConnectionContext::new(
            Arc::clone(&self.state),
            Arc::clone(&self.subscriptions),
            Arc::clone(&self.peers),
            Arc::clone(&self.rate_limiter),
            chrono::Utc::now(),
        )
    }
}

/// Binds the Unix socket at `path` with mode 0600, removing a stale file
/// first. The caller (lifecycle startup) has already confirmed no other
/// daemon owns this path (§4.10).
pub fn bind_unix_socket(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(listener)
}

/// Binds the WebSocket listener on an OS-assigned `127.0.0.1` port and
/// writes the chosen port to `ws_port_path` for client discovery.
pub async fn bind_websocket(ws_port_path: &Path) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    std::fs::write(ws_port_path, port.to_string())?;
    Ok(listener)
}

/// Runs the Unix socket accept loop until `shutdown` is cancelled.
pub async fn serve_unix(listener: UnixListener, shared: Shared, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("unix listener stopping");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let shared = shared.clone();
                        let conn_shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            serve_unix_connection(BufReader::new(reader), writer, shared, conn_shutdown).await;
                        });
                    }
                    Err(e) => error!(error = %e, "unix accept error"),
                }
            }
        }
    }
}

/// Runs the WebSocket accept loop until `shutdown` is cancelled.
pub async fn serve_websocket(listener: TcpListener, shared: Shared, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("websocket listener stopping");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!(peer = %addr, "websocket connection accepted");
                        let shared = shared.clone();
                        let conn_shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            serve_websocket_connection(stream, shared, conn_shutdown).await;
                        });
                    }
                    Err(e) => error!(error = %e, "websocket accept error"),
                }
            }
        }
    }
}

/// Drains every subscription `ctx` owns and writes each queued notification
/// out, until `shutdown` fires. Runs as a sibling task to the request
/// reader so a connection with no open subscriptions costs nothing beyond
/// one idle timer tick.
async fn push_notifications<W: AsyncWrite + Unpin>(
    ctx: Arc<ConnectionContext>,
    writer: Arc<AsyncMutex<W>>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(PUSH_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                for subscription_id in ctx.owned_subscriptions() {
                    for notification in ctx.subscriptions.drain(&subscription_id) {
                        let Ok(bytes) = framing::encode(&notification) else { continue };
                        let mut writer = writer.lock().await;
                        if framing::write_line(&mut *writer, &bytes).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn serve_unix_connection<R, W>(mut reader: R, writer: W, shared: Shared, shutdown: CancellationToken)
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let ctx = Arc::new(shared.new_context());
    let writer = Arc::new(AsyncMutex::new(writer));

    let push_task = tokio::spawn(push_notifications(Arc::clone(&ctx), Arc::clone(&writer), shutdown.clone()));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            line = framing::read_line(&mut reader) => {
                match line {
                    Ok(Some(bytes)) => {
                        if !handle_line(&bytes, &ctx, &writer).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "malformed line on connection, closing");
                        break;
                    }
                }
            }
        }
    }

    push_task.abort();
    let _ = writer.lock().await.shutdown().await;
}

async fn handle_line<W: AsyncWrite + Unpin>(
    bytes: &[u8],
    ctx: &Arc<ConnectionContext>,
    writer: &Arc<AsyncMutex<W>>,
) -> bool {
    let Ok(incoming) = framing::decode::<Incoming>(bytes) else {
        let response = Response::failure(None, ErrorObject::parse_error("malformed JSON-RPC payload"));
        return write_line(writer, &response).await;
    };

    let requests = incoming.into_requests();
    let mut responses = Vec::with_capacity(requests.len());
    for request in requests {
        if let Some(response) = rpc::dispatch(ctx, request).await {
            responses.push(response);
        }
    }
    match responses.len() {
        0 => true,
        1 => write_line(writer, &responses[0]).await,
        _ => write_line(writer, &responses).await,
    }
}

async fn write_line<W: AsyncWrite + Unpin, T: serde::Serialize>(writer: &Arc<AsyncMutex<W>>, value: &T) -> bool {
    let Ok(bytes) = framing::encode(value) else { return false };
    let mut writer = writer.lock().await;
    framing::write_line(&mut *writer, &bytes).await.is_ok()
}

async fn serve_websocket_connection(stream: tokio::net::TcpStream, shared: Shared, shutdown: CancellationToken) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            return;
        }
    };
    let ctx = Arc::new(shared.new_context());
    let (write, mut read) = ws_stream.split();
    let write = Arc::new(AsyncMutex::new(write));

    let push_task = tokio::spawn(push_notifications_ws(Arc::clone(&ctx), Arc::clone(&write), shutdown.clone()));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = read.next() => {
                let Some(Ok(frame)) = frame else { break };
                let text = match frame {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(_) => break,
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) | WsMessage::Frame(_) => continue,
                };
                if !handle_ws_message(text.as_bytes(), &ctx, &write).await {
                    break;
                }
            }
        }
    }
    push_task.abort();
}

async fn push_notifications_ws<W>(ctx: Arc<ConnectionContext>, write: Arc<AsyncMutex<W>>, shutdown: CancellationToken)
where
    W: futures_util::Sink<WsMessage> + Unpin,
{
    let mut ticker = tokio::time::interval(PUSH_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                for subscription_id in ctx.owned_subscriptions() {
                    for notification in ctx.subscriptions.drain(&subscription_id) {
                        if !send_ws(&write, &notification).await {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn handle_ws_message<W>(bytes: &[u8], ctx: &Arc<ConnectionContext>, write: &Arc<AsyncMutex<W>>) -> bool
where
    W: futures_util::Sink<WsMessage> + Unpin,
{
    let Ok(incoming) = framing::decode::<Incoming>(bytes) else {
        let response = Response::failure(None, ErrorObject::parse_error("malformed JSON-RPC payload"));
        return send_ws(write, &response).await;
    };

    let requests = incoming.into_requests();
    let mut responses = Vec::with_capacity(requests.len());
    for request in requests {
        if let Some(response) = rpc::dispatch(ctx, request).await {
            responses.push(response);
        }
    }
    match responses.len() {
        0 => true,
        1 => send_ws(write, &responses[0]).await,
        _ => send_ws(write, &responses).await,
    }
}

async fn send_ws<W, T>(write: &Arc<AsyncMutex<W>>, value: &T) -> bool
where
    W: futures_util::Sink<WsMessage> + Unpin,
    T: serde::Serialize,
{
    let Ok(text) = serde_json::to_string(value) else { return false };
    let mut write = write.lock().await;
    write.send(WsMessage::Text(text.into())).await.is_ok()
}
