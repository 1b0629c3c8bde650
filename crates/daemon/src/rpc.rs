// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Method registry and per-connection dispatch loop (§4.7).
//!
//! One [`ConnectionContext`] per transport connection: a connection binds
//! to an agent session via `session.start` and every later call on that
//! connection (message send, subscribe, context save) is implicitly scoped
//! to that session, the way a phone call stays on one line.

use crate::handlers;
use crate::state::State;
use crate::subscriptions::SubscriptionRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use thrum_core::{AgentId, SessionId, SubscriptionId, ThrumError};
use thrum_sync::{PeerRegistry, RateLimiter};
use thrum_wire::{method, ErrorObject, Request, Response};

#[derive(Clone)]
pub struct SessionBinding {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub agent_name: String,
}

pub struct ConnectionContext {
    pub state: Arc<State>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub peers: Arc<PeerRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub session: Mutex<Option<SessionBinding>>,
    /// Subscriptions created on this connection, so its writer task knows
    /// which outboxes to drain and push over its own wire (§4.6). A
    /// subscription outlives nothing beyond this connection's lifetime.
    owned_subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl ConnectionContext {
    pub fn new(
        state: Arc<State>,
        subscriptions: Arc<SubscriptionRegistry>,
        peers: Arc<PeerRegistry>,
        rate_limiter: Arc<RateLimiter>,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            state,
            subscriptions,
            peers,
            rate_limiter,
            started_at,
            session: Mutex::new(None),
            owned_subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn bind_session(&self, binding: SessionBinding) {
        *self.session.lock() = Some(binding);
    }

    pub fn current_session(&self) -> Result<SessionBinding, ThrumError> {
        self.session.lock().clone().ok_or_else(|| ThrumError::invalid_argument("no active session on this connection"))
    }

    pub fn clear_session(&self) {
        *self.session.lock() = None;
    }

    pub fn track_subscription(&self, subscription_id: SubscriptionId) {
        self.owned_subscriptions.lock().push(subscription_id);
    }

    pub fn untrack_subscription(&self, subscription_id: &SubscriptionId) {
        self.owned_subscriptions.lock().retain(|id| id != subscription_id);
    }

    pub fn owned_subscriptions(&self) -> Vec<SubscriptionId> {
        self.owned_subscriptions.lock().clone()
    }
}

/// Dispatches one decoded request and builds its response. Notifications
/// (no `id`) still run their side effect but the caller discards the
/// return value rather than writing a response line.
pub async fn dispatch(ctx: &ConnectionContext, request: Request) -> Option<Response> {
    let id = request.id.clone();
    let result = handle(ctx, &request.method, request.params).await;

    if request.is_notification() {
        if let Err(err) = result {
            tracing::warn!(method = %request.method, error = %err.message, "notification handler failed");
        }
        return None;
    }

    Some(match result {
        Ok(value) => Response::success(id, value),
        Err(err) => Response::failure(id, err),
    })
}

/// Returns an [`ErrorObject`] rather than [`ThrumError`] so an unmatched
/// method can answer with -32601 directly instead of being forced through
/// the domain error taxonomy (which has no "method not found" member).
async fn handle(
    ctx: &ConnectionContext,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, ErrorObject> {
    let result: Result<serde_json::Value, ThrumError> = match method {
        method::AGENT_REGISTER => handlers::agent::register(ctx, params),
        method::AGENT_DEREGISTER => handlers::agent::deregister(ctx, params),
        method::AGENT_LIST => handlers::agent::list(ctx),
        method::SESSION_START => handlers::agent::session_start(ctx, params),
        method::SESSION_HEARTBEAT => handlers::agent::session_heartbeat(ctx, params),
        method::SESSION_END => handlers::agent::session_end(ctx, params),
        method::CONTEXT_SAVE => handlers::agent::context_save(ctx, params),
        method::CONTEXT_CLEAR => handlers::agent::context_clear(ctx, params),

        method::MESSAGE_SEND => handlers::messaging::send(ctx, params),
        method::MESSAGE_LIST => handlers::messaging::list(ctx, params),
        method::MESSAGE_READ => handlers::messaging::read(ctx, params),
        method::THREAD_CREATE => handlers::messaging::thread_create(ctx, params),
        method::THREAD_REPLY => handlers::messaging::thread_reply(ctx, params),

        method::GROUP_CREATE => handlers::groups::create(ctx, params),
        method::GROUP_ADD => handlers::groups::add(ctx, params),
        method::GROUP_REMOVE => handlers::groups::remove(ctx, params),
        method::GROUP_LIST => handlers::groups::list(ctx),
        method::GROUP_MEMBERS => handlers::groups::members(ctx, params),
        method::GROUP_DELETE => handlers::groups::delete(ctx, params),

        method::SUBSCRIBE_CREATE => handlers::subscribe::create(ctx, params),
        method::UNSUBSCRIBE => handlers::subscribe::unsubscribe(ctx, params),

        method::HEALTH => handlers::health::health(ctx),

        method::SYNC_PEER_INFO => handlers::sync::peer_info(ctx),
        method::SYNC_PULL => handlers::sync::pull(ctx, params),
        method::SYNC_NOTIFY => handlers::sync::notify(ctx, params),

        other => return Err(ErrorObject::method_not_found(other)),
    };
    result.map_err(ErrorObject::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;
    use thrum_wire::RequestId;

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (ctx, _dir) = test_ctx();
        let request = Request {
            jsonrpc: "2.0".into(),
            method: "no.such.method".into(),
            params: None,
            id: Some(RequestId::Number(1)),
        };
        let response = dispatch(&ctx, request).await.unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, thrum_wire::code::METHOD_NOT_FOUND);
    }
}
