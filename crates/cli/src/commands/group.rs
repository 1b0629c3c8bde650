// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! `thrum group list` - groups known to this daemon. Creating or mutating
//! groups needs a bound session, same constraint as `message.send` (see
//! `commands::message`), so only the read path is exposed here.

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use thrum_core::Group;
use thrum_wire::method;

#[derive(Debug, Deserialize, Serialize)]
struct GroupListResult {
    groups: Vec<Group>,
}

pub async fn list(format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let result: GroupListResult = client.call(method::GROUP_LIST, None::<()>).await?;

    format_or_json(format, &result.groups, || {
        if result.groups.is_empty() {
            println!("no groups");
            return;
        }
        for group in &result.groups {
            println!("{:<20} {} member(s)", group.name, group.members.len());
        }
    })
}
