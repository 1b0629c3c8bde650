// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `thrum`: a thin operator client over `thrumd`'s Unix socket.
//!
//! Deliberately minimal: no interactive session, no message sending (both
//! need a connection-bound session a one-shot CLI invocation never holds).
//! Enough to register an agent, read what's there, and check on a daemon
//! from the shell.

mod client;
mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use commands::{agent, group, health, message, peer};
use exit_error::ExitError;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "thrum", version, about = "Operator client for the thrum messaging daemon")]
struct Cli {
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon uptime, peer checkpoints, rate-limit posture
    Health,
    /// Register or list agents
    Agent(agent::AgentArgs),
    /// List messages visible to this daemon
    Messages(message::MessagesArgs),
    /// List groups known to this daemon
    Group,
    /// This daemon's own sync identity
    Peer,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        match err.downcast::<ExitError>() {
            Ok(exit_error) => {
                eprintln!("thrum: {exit_error}");
                std::process::exit(exit_error.code);
            }
            Err(other) => {
                eprintln!("thrum: {other}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Health => health::health(cli.format).await,
        Command::Agent(args) => agent::agent(args, cli.format).await,
        Command::Messages(args) => message::messages(args, cli.format).await,
        Command::Group => group::list(cli.format).await,
        Command::Peer => peer::info(cli.format).await,
    }
    .map_err(|e| match e.downcast::<client::ClientError>() {
        Ok(client_err) if client_err.is_not_running() => ExitError::new(2, client_err.to_string()).into(),
        Ok(client_err) => anyhow::anyhow!(client_err),
        Err(other) => other,
    })
}
