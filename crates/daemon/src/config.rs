// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Filesystem layout for one daemon instance, rooted at a repo's `.thrum`
//! directory (§4.10: a daemon is affine to the repo it was started in).

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
}

impl Config {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self { root: repo_root.into().join(".thrum") }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.root.join("daemon.sock")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("daemon.lock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.root.join("daemon.pid")
    }

    pub fn ws_port_path(&self) -> PathBuf {
        self.root.join("ws.port")
    }

    pub fn event_log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn projection_path(&self) -> PathBuf {
        self.root.join("projection.db")
    }

    pub fn log_file_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.event_log_dir())?;
        std::fs::create_dir_all(self.log_file_dir())?;
        Ok(())
    }
}

/// Walks up from `start` looking for a `.git` directory, the repo-affinity
/// anchor a daemon binds its `.thrum` state to.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_nest_under_dot_thrum() {
        let config = Config::new("/repo");
        assert_eq!(config.socket_path(), Path::new("/repo/.thrum/daemon.sock"));
        assert_eq!(config.pid_path(), Path::new("/repo/.thrum/daemon.pid"));
    }
}
