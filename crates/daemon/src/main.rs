// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! `thrumd` binary entry point: resolves the repo this instance is affine
//! to, brings a [`lifecycle::Daemon`] up, serves until a shutdown signal,
//! and tears it back down (§4.10).

use std::process::ExitCode;
use std::sync::Arc;
use thrum_daemon::{config::Config, env, git_bridge, lifecycle, scheduler};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn fresh_daemon_id() -> String {
    format!("dmn-{}", nanoid::nanoid!(12))
}

fn resolve_config() -> Result<Config, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read current directory: {e}"))?;
    let repo_root = thrum_daemon::config::find_repo_root(&cwd)
        .ok_or_else(|| format!("no .git found above {}", cwd.display()))?;
    Ok(Config::new(repo_root))
}

fn init_logging(config: &Config) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(config.log_file_dir(), "thrumd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .init();
    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("thrumd: {e}");
            return ExitCode::from(lifecycle::EXIT_STARTUP_FAILURE as u8);
        }
    };

    if let Err(e) = config.ensure_dirs() {
        eprintln!("thrumd: failed to prepare {}: {e}", config.root.display());
        return ExitCode::from(lifecycle::EXIT_STARTUP_FAILURE as u8);
    }
    let _log_guard = init_logging(&config);

    let identity = env::identity_fallback();
    let daemon_id = identity.name.clone().unwrap_or_else(fresh_daemon_id);

    let daemon = match lifecycle::Daemon::startup(config.clone(), daemon_id).await {
        Ok(daemon) => daemon,
        Err(lifecycle::LifecycleError::AlreadyRunning) => {
            eprintln!("thrumd: a daemon is already running for {}", config.root.display());
            return ExitCode::from(lifecycle::EXIT_ALREADY_RUNNING as u8);
        }
        Err(e) => {
            eprintln!("thrumd: startup failed: {e}");
            return ExitCode::from(lifecycle::EXIT_STARTUP_FAILURE as u8);
        }
    };

    tracing::info!(repo = %config.root.display(), daemon_id = %daemon.state.daemon_id, "thrumd started");

    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    {
        let notify_tx = notify_tx.clone();
        let daemon_id = daemon.state.daemon_id.clone();
        daemon.state.set_on_event_write(Box::new(move |event| {
            let hint = thrum_wire::method::SyncNotifyParams {
                daemon_id: daemon_id.clone(),
                latest_seq: event.sequence,
                event_count: 1,
            };
            let _ = notify_tx.send(hint);
        }));
    }

    let shutdown = daemon.shutdown_token();
    let scheduler_task = tokio::spawn(scheduler::run(
        Arc::clone(&daemon.state),
        Arc::clone(&daemon.peers),
        Arc::clone(&daemon.rate_limiter),
        notify_rx,
        shutdown.clone(),
    ));

    let repo_root = config.root.parent().unwrap_or(&config.root).to_path_buf();
    let git_bridge_task = match git_bridge::GitBridge::open(&repo_root) {
        Ok(bridge) => Some(tokio::spawn(git_bridge::run_periodic(
            bridge,
            Arc::clone(&daemon.state),
            "origin".to_string(),
            env::sync_interval(),
            shutdown.clone(),
        ))),
        Err(e) => {
            tracing::debug!(error = %e, "git sync bridge unavailable, continuing without it");
            None
        }
    };

    let serve_task = tokio::spawn(async move {
        if let Err(e) = lifecycle::serve(&daemon).await {
            tracing::error!(error = %e, "transport listeners exited with an error");
        }
        daemon
    });

    lifecycle::wait_for_shutdown_signal().await;
    shutdown.cancel();

    let daemon = match serve_task.await {
        Ok(daemon) => Some(daemon),
        Err(e) => {
            tracing::error!(error = %e, "serve task panicked");
            None
        }
    };
    scheduler_task.abort();
    if let Some(task) = git_bridge_task {
        task.abort();
    }

    if let Some(daemon) = daemon {
        daemon.shutdown().await;
    }

    tracing::info!("thrumd exited cleanly");
    ExitCode::SUCCESS
}
