// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Sync-facing handlers: what a peer daemon calls on this one (§4.8).
//!
//! `sync.pull` is the receiver side of the pull-based protocol — a peer
//! calls it on us to fetch our history past its checkpoint. The matching
//! client side (us pulling from a peer) lives in `thrum_sync::pull`.

use crate::handlers::require_params;
use crate::rpc::ConnectionContext;
use thrum_core::{Event, ThrumError};
use thrum_sync::Admission;
use thrum_wire::method::{SyncNotifyParams, SyncPullParams};

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let payload_json: String = row.get("payload")?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Event {
        event_id: row.get("event_id")?,
        sequence: row.get::<_, i64>("sequence")? as u64,
        timestamp: row.get("timestamp")?,
        origin_daemon: row.get("origin_daemon")?,
        payload,
    })
}

pub fn peer_info(ctx: &ConnectionContext) -> Result<serde_json::Value, ThrumError> {
    Ok(serde_json::json!({ "daemon_id": ctx.state.daemon_id, "name": ctx.state.daemon_id }))
}

pub fn pull(ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: SyncPullParams = require_params(params)?;

    match ctx.rate_limiter.admit("inbound-sync") {
        Admission::Allowed => {}
        Admission::RateLimited => return Err(ThrumError::Unavailable("rate limit exceeded".to_string())),
        Admission::QueueSaturated => return Err(ThrumError::Unavailable("sync queue saturated".to_string())),
    }

    let limit = params.limit.max(1) as i64;
    let result = ctx.state.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM events WHERE sequence > ?1 ORDER BY sequence ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![params.after_sequence as i64, limit + 1], row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    });
    ctx.rate_limiter.release();

    let mut events = result?;
    let more = events.len() as i64 > limit;
    if more {
        events.truncate(limit as usize);
    }
    let next_sequence = events.last().map(|e| e.sequence).unwrap_or(params.after_sequence);

    Ok(serde_json::json!({ "events": events, "next_sequence": next_sequence, "more": more }))
}

pub fn notify(_ctx: &ConnectionContext, params: Option<serde_json::Value>) -> Result<serde_json::Value, ThrumError> {
    let params: SyncNotifyParams = require_params(params)?;
    tracing::debug!(
        peer = %params.daemon_id,
        latest_seq = params.latest_seq,
        event_count = params.event_count,
        "received sync push-notify hint"
    );
    Ok(serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;
    use thrum_core::{AgentId, EventPayload};

    #[test]
    fn peer_info_reports_this_daemons_id() {
        let (ctx, _dir) = test_ctx();
        let result = peer_info(&ctx).unwrap();
        assert_eq!(result["daemon_id"], "dmn-test");
    }

    #[test]
    fn pull_returns_events_past_the_given_sequence() {
        let (ctx, _dir) = test_ctx();
        ctx.state
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

        let result = pull(&ctx, Some(serde_json::json!({ "after_sequence": 0, "limit": 10 }))).unwrap();
        let events = result["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert!(!result["more"].as_bool().unwrap());
    }

    #[test]
    fn pull_sets_more_when_results_are_truncated() {
        let (ctx, _dir) = test_ctx();
        for i in 0..3 {
            ctx.state
                .write_event(
                    EventPayload::AgentRegister {
                        agent_id: AgentId::new(),
                        name: format!("impl{i}"),
                        role: "implementer".into(),
                        module: "auth".into(),
                        display: None,
                        hostname: "host1".into(),
                        public_key: None,
                    },
                    None,
                )
                .unwrap();
        }

        let result = pull(&ctx, Some(serde_json::json!({ "after_sequence": 0, "limit": 2 }))).unwrap();
        assert_eq!(result["events"].as_array().unwrap().len(), 2);
        assert!(result["more"].as_bool().unwrap());
    }

    #[test]
    fn notify_accepts_a_hint_without_side_effects() {
        let (ctx, _dir) = test_ctx();
        let result = notify(&ctx, Some(serde_json::json!({ "daemon_id": "dmn-peer", "latest_seq": 5, "event_count": 1 }))).unwrap();
        assert_eq!(result, serde_json::json!({}));
    }
}
