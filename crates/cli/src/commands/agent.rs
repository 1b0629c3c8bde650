// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! `thrum agent` - register and list agents known to this daemon.

use crate::client::DaemonClient;
use crate::output::{format_or_json, format_time_ago, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use thrum_core::Agent;
use thrum_wire::method::{self, AgentRegisterParams};

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Register a new agent identity with this daemon
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        module: String,
        #[arg(long)]
        display: Option<String>,
    },
    /// List every agent this daemon has seen
    List,
}

#[derive(Debug, Deserialize, Serialize)]
struct AgentListResult {
    agents: Vec<Agent>,
}

pub async fn agent(args: AgentArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        AgentCommand::Register { name, role, module, display } => register(name, role, module, display, format).await,
        AgentCommand::List => list(format).await,
    }
}

async fn register(name: String, role: String, module: String, display: Option<String>, format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let params = AgentRegisterParams {
        name: name.clone(),
        role,
        module,
        display,
        hostname: None,
        public_key: None,
    };
    let agent: Agent = client.call(method::AGENT_REGISTER, Some(params)).await?;
    format_or_json(format, &agent, || println!("registered {} as {}", agent.agent_id, name))
}

async fn list(format: OutputFormat) -> Result<()> {
    let client = DaemonClient::connect()?;
    let result: AgentListResult = client.call(method::AGENT_LIST, None::<()>).await?;

    format_or_json(format, &result.agents, || {
        if result.agents.is_empty() {
            println!("no agents registered");
            return;
        }
        for agent in &result.agents {
            println!(
                "{:<12} {:<16} {:<12} last seen {}",
                agent.name,
                agent.role,
                agent.module,
                format_time_ago(agent.last_seen_at)
            );
        }
    })
}
