// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Operator/diagnostic snapshot (§4.9): uptime, per-peer sync checkpoints,
//! and the current rate-limit posture.

use crate::rpc::ConnectionContext;
use thrum_core::ThrumError;

pub fn health(ctx: &ConnectionContext) -> Result<serde_json::Value, ThrumError> {
    let peers = ctx.state.with_connection(thrum_sync::list_all_checkpoints)?;

    let rate_limits = serde_json::json!({
        "max_rps": ctx.rate_limiter.rate(),
        "burst": ctx.rate_limiter.burst() as u32,
        "queue_depth": ctx.rate_limiter.in_flight() as u32,
        "max_queue_depth": ctx.rate_limiter.queue_cap() as u32,
    });

    Ok(serde_json::json!({
        "status": "ok",
        "since": ctx.started_at,
        "peers": peers,
        "rate_limits": rate_limits,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_ctx;

    #[test]
    fn health_reports_ok_with_no_peers() {
        let (ctx, _dir) = test_ctx();
        let result = health(&ctx).unwrap();
        assert_eq!(result["status"], "ok");
        assert!(result["peers"].as_array().unwrap().is_empty());
        assert_eq!(result["rate_limits"]["max_rps"], ctx.rate_limiter.rate());
    }
}
