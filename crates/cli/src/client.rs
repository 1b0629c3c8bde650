// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! A thin client over the daemon's Unix socket: one request per connection,
//! mirroring how the daemon itself treats each accepted connection as
//! independent (§4.5). No persistent connection or subscription handling —
//! that belongs to a richer agent SDK, not this operator tool.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use thrum_wire::{decode, encode, read_line, write_line, FramingError, Request, RequestId, Response};
use tokio::io::BufReader;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no thrum daemon is running for this repo")]
    NotRunning,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("daemon closed the connection without a reply")]
    NoReply,
    #[error("daemon returned an error: {message} (code {code})")]
    Rpc { code: i64, message: String },
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning)
    }
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Resolves the daemon socket for the repo containing the current
    /// directory. Does not verify anything is listening; that is deferred
    /// to the first real call, the same way the teacher's `DaemonClient`
    /// only discovers a dead socket on first use.
    pub fn connect() -> Result<Self, ClientError> {
        let cwd = std::env::current_dir()?;
        let repo_root = thrum_daemon_config_root(&cwd).ok_or(ClientError::NotRunning)?;
        Ok(Self { socket_path: repo_root })
    }

    pub async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: Option<P>) -> Result<R, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|_| ClientError::NotRunning)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let params = params.map(|p| serde_json::to_value(p)).transpose().map_err(FramingError::from)?;
        let request = Request {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: Some(RequestId::Number(1)),
        };
        let bytes = encode(&request)?;
        write_line(&mut write_half, &bytes).await?;

        let line = read_line(&mut reader).await?.ok_or(ClientError::NoReply)?;
        let response: Response = decode(&line)?;

        match (response.result, response.error) {
            (Some(result), _) => Ok(serde_json::from_value(result).map_err(FramingError::from)?),
            (None, Some(err)) => Err(ClientError::Rpc { code: err.code, message: err.message }),
            (None, None) => Err(ClientError::NoReply),
        }
    }
}

/// Walks up from `start` for `.git`, then returns the daemon socket path
/// beneath that repo's `.thrum` directory — deliberately independent of
/// `thrum-daemon`, which this crate does not depend on.
fn thrum_daemon_config_root(start: &std::path::Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.join(".thrum").join("daemon.sock"));
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_socket_beneath_the_nearest_git_root() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let socket = thrum_daemon_config_root(&nested).unwrap();
        assert_eq!(socket, dir.path().join(".thrum").join("daemon.sock"));
    }

    #[test]
    fn returns_none_outside_any_repo() {
        let dir = tempdir().unwrap();
        assert!(thrum_daemon_config_root(dir.path()).is_none());
    }
}
