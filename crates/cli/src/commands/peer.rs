// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! `thrum peer info` - this daemon's own sync identity, the minimum needed
//! to hand to another daemon's operator when wiring up a peer by hand.

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};
use anyhow::Result;
use thrum_wire::method::{self, SyncPeerInfoResult};

pub async fn info(format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let result: SyncPeerInfoResult = client.call(method::SYNC_PEER_INFO, None::<()>).await?;
    format_or_json(format, &result, || println!("{} ({})", result.name, result.daemon_id))
}
