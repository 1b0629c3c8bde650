// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! `thrum health` - daemon uptime, peer checkpoints, rate-limit posture.

use crate::client::DaemonClient;
use crate::output::{format_or_json, format_time_ago, OutputFormat};
use anyhow::Result;
use thrum_wire::method::{self, HealthResult};

pub async fn health(format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let result: HealthResult = client.call(method::HEALTH, None::<()>).await?;

    format_or_json(format, &result, || {
        println!("status: {} (since {})", result.status, format_time_ago(result.since));
        if let Some(peers) = &result.peers {
            println!("peers:");
            for checkpoint in peers {
                println!("  {} - last synced seq {}", checkpoint.peer_daemon_id, checkpoint.last_synced_sequence);
            }
        }
        if let Some(limits) = &result.rate_limits {
            println!(
                "rate limit: {:.1} rps, burst {}, queue {}/{}",
                limits.max_rps, limits.burst, limits.queue_depth, limits.max_queue_depth
            );
        }
    })
}
