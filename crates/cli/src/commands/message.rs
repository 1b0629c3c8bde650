// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! `thrum messages` - list messages visible to this repo's daemon.
//!
//! Sending is deliberately not exposed here: `message.send` requires a
//! session bound to the connection it runs on (`session.start` then
//! `message.send` on the same socket), which a one-shot CLI invocation
//! never establishes. That belongs to an agent's own persistent
//! connection, not this diagnostic client.

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};
use anyhow::Result;
use clap::Args;
use thrum_wire::method::{self, MessageListParams, MessageListResult};

#[derive(Args)]
pub struct MessagesArgs {
    /// Only messages addressed to this agent name
    #[arg(long)]
    pub for_agent: Option<String>,
    /// Only messages this agent has not yet read
    #[arg(long)]
    pub unread_for_agent: Option<String>,
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long, default_value = "50")]
    pub page_size: u32,
}

pub async fn messages(args: MessagesArgs, format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let params = MessageListParams {
        for_agent: args.for_agent,
        unread_for_agent: args.unread_for_agent,
        thread_id: None,
        scope: None,
        page: args.page.unwrap_or(0),
        page_size: args.page_size,
    };
    let result: MessageListResult = client.call(method::MESSAGE_LIST, Some(params)).await?;

    format_or_json(format, &result, || {
        if result.messages.is_empty() {
            println!("no messages");
            return;
        }
        for item in &result.messages {
            let flag = if item.read { " " } else { "*" };
            println!("{flag} {} {}", item.message.message_id, item.message.body.content);
        }
        println!("\n{} of {} total", result.messages.len(), result.total);
    })
}
