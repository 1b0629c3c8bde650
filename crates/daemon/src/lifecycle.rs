// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Daemon singleton, startup, and graceful shutdown (§4.10).
//!
//! Grounded on the teacher's `lifecycle::{startup, mod}`: acquire an
//! exclusive lock file first, then open storage, then bind listeners, in
//! that order. The lock file is the actual singleton guard — `flock` is
//! released by the OS the moment a process dies or exits, crash or clean,
//! so there is no stale-lock case to reason about. The PID file is kept
//! alongside it purely as an operator-facing record (§6); it plays no part
//! in deciding whether a daemon may start.

use crate::config::Config;
use crate::state::State;
use crate::subscriptions::SubscriptionRegistry;
use crate::transport::{self, Shared};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use thrum_core::ThrumError;
use thrum_sync::{PeerRegistry, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another daemon already holds the lock for this repo")]
    AlreadyRunning,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state error: {0}")]
    State(#[from] ThrumError),
}

/// Exit code for `AlreadyRunning`, per §6 "Exit codes".
pub const EXIT_ALREADY_RUNNING: i32 = 2;
pub const EXIT_STARTUP_FAILURE: i32 = 1;

/// Contents of `daemon.pid`: an operator-facing record of the running
/// instance, written only after the lock is held.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PidFile {
    pid: u32,
    repo_path: std::path::PathBuf,
    started_at: chrono::DateTime<chrono::Utc>,
    socket_path: std::path::PathBuf,
}

fn write_pid_file(config: &Config) -> std::io::Result<()> {
    let pid_file = PidFile {
        pid: std::process::id(),
        repo_path: config.root.clone(),
        started_at: chrono::Utc::now(),
        socket_path: config.socket_path(),
    };
    let json = serde_json::to_string_pretty(&pid_file).unwrap_or_default();
    std::fs::write(config.pid_path(), json)
}

/// Everything a running daemon needs to serve requests and shut down
/// cleanly. Returned by [`Daemon::startup`]; the caller drives [`serve`] and
/// then [`Daemon::shutdown`].
pub struct Daemon {
    pub config: Config,
    pub state: Arc<State>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub peers: Arc<PeerRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
    shutdown: CancellationToken,
    _lock_file: File,
}

impl Daemon {
    /// Acquires the singleton lock, opens storage (replaying any drift),
    /// and returns a daemon ready to bind transports. Cleans up its own
    /// partial state on any failure past the lock acquisition (a held lock
    /// means another daemon owns whatever files exist, so those are left
    /// alone).
    pub async fn startup(config: Config, daemon_id: String) -> Result<Self, LifecycleError> {
        config.ensure_dirs()?;

        match startup_inner(&config, daemon_id).await {
            Ok(daemon) => Ok(daemon),
            Err(err) => {
                if !matches!(err, LifecycleError::AlreadyRunning) {
                    cleanup_on_failure(&config);
                }
                Err(err)
            }
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Graceful shutdown sequence (§4.10): signal new connections to stop,
    /// let the drain grace period elapse, then remove runtime files. The
    /// OS releases the lock file when `self` drops.
    pub async fn shutdown(self) {
        info!("shutting down");
        self.shutdown.cancel();
        tokio::time::sleep(crate::env::drain_timeout()).await;
        cleanup_on_failure(&self.config);
        info!("shutdown complete");
    }
}

async fn startup_inner(config: &Config, daemon_id: String) -> Result<Daemon, LifecycleError> {
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(config.lock_path())?;
    lock_file.try_lock_exclusive().map_err(|_| LifecycleError::AlreadyRunning)?;

    write_pid_file(config)?;

    let state = State::open(&config.event_log_dir(), &config.projection_path(), daemon_id)?;

    Ok(Daemon {
        config: config.clone(),
        state: Arc::new(state),
        subscriptions: Arc::new(SubscriptionRegistry::new()),
        peers: Arc::new(PeerRegistry::new()),
        rate_limiter: Arc::new(RateLimiter::with_defaults()),
        started_at: Instant::now(),
        shutdown: CancellationToken::new(),
        _lock_file: lock_file,
    })
}

fn cleanup_on_failure(config: &Config) {
    for path in [config.socket_path(), config.ws_port_path(), config.pid_path()] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove runtime file during cleanup");
            }
        }
    }
}

/// Binds both transports for `daemon` and runs them until `daemon`'s
/// shutdown token fires.
pub async fn serve(daemon: &Daemon) -> Result<(), LifecycleError> {
    let unix_listener = transport::bind_unix_socket(&daemon.config.socket_path())?;
    let ws_listener = transport::bind_websocket(&daemon.config.ws_port_path()).await?;

    let shared = Shared {
        state: Arc::clone(&daemon.state),
        subscriptions: Arc::clone(&daemon.subscriptions),
        peers: Arc::clone(&daemon.peers),
        rate_limiter: Arc::clone(&daemon.rate_limiter),
    };
    let shutdown = daemon.shutdown_token();

    let unix_task = tokio::spawn(transport::serve_unix(unix_listener, shared.clone(), shutdown.clone()));
    let ws_task = tokio::spawn(transport::serve_websocket(ws_listener, shared, shutdown));

    let _ = tokio::join!(unix_task, ws_task);
    Ok(())
}

/// Blocks until SIGINT or SIGTERM, guarded so only the first signal drives
/// shutdown (a second Ctrl-C while draining is ignored, matching §4.10's
/// "triggers shutdown once").
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn startup_then_shutdown_round_trips() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path());
        let daemon = Daemon::startup(config.clone(), "dmn-test".into()).await.unwrap();
        assert!(config.lock_path().exists());
        daemon.shutdown().await;
        assert!(!config.pid_path().exists());
    }

    #[tokio::test]
    async fn second_startup_against_same_repo_is_refused() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path());
        let daemon = Daemon::startup(config.clone(), "dmn-test".into()).await.unwrap();

        let second = Daemon::startup(config.clone(), "dmn-test-2".into()).await;
        assert!(matches!(second, Err(LifecycleError::AlreadyRunning)));

        daemon.shutdown().await;
    }

    #[test]
    fn pid_file_round_trips_through_json() {
        let pid_file = PidFile {
            pid: 1234,
            repo_path: "/repo/.thrum".into(),
            started_at: chrono::Utc::now(),
            socket_path: "/repo/.thrum/daemon.sock".into(),
        };
        let json = serde_json::to_string(&pid_file).unwrap();
        let parsed: PidFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.pid, 1234);
    }
}
