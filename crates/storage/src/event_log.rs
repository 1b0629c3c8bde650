// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! The append-only JSONL event log (§4.1, §6).
//!
//! Layout under the sync directory:
//! - `events.jsonl` — lifecycle events (everything except `message.create`,
//!   `message.edit`, `message.delete`).
//! - `messages/<agent-name>.jsonl` — one shard per sending agent.
//!
//! Each shard is opened for append, locked with an advisory file lock for
//! the duration of a write, and fsynced before the call returns. A
//! `sequence` is assigned under the same in-process write lock the daemon
//! uses for the projection commit, so the two never drift relative to each
//! other within one process (cross-process writers are excluded entirely
//! by the daemon singleton, §4.10).

use crate::error::{Result, StorageError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thrum_core::Event;
use tracing::warn;

pub struct EventLog {
    root: PathBuf,
}

fn events_path(root: &Path) -> PathBuf {
    root.join("events.jsonl")
}

fn shard_path(root: &Path, agent_name: &str) -> PathBuf {
    root.join("messages").join(format!("{agent_name}.jsonl"))
}

impl EventLog {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join("messages"))?;
        Ok(Self { root })
    }

    /// Appends `event` to the appropriate shard: message events (keyed by
    /// sending agent name, which the caller supplies since the log has no
    /// agent-id -> name mapping of its own) go to `messages/<name>.jsonl`;
    /// everything else goes to `events.jsonl`.
    pub fn append(&self, event: &Event, sender_name: Option<&str>) -> Result<()> {
        let path = match sender_name {
            Some(name) if is_message_event(event) => shard_path(&self.root, name),
            _ => events_path(&self.root),
        };
        append_line(&path, event)
    }

    pub fn read_all(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        events.extend(read_jsonl(&events_path(&self.root))?);

        let shards_dir = self.root.join("messages");
        if shards_dir.is_dir() {
            let mut shard_paths: Vec<PathBuf> = fs::read_dir(&shards_dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map(|ext| ext == "jsonl").unwrap_or(false))
                .collect();
            shard_paths.sort();
            for path in shard_paths {
                events.extend(read_jsonl(&path)?);
            }
        }

        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }
}

fn is_message_event(event: &Event) -> bool {
    matches!(
        event.type_tag(),
        "message.create" | "message.edit" | "message.delete"
    )
}

fn append_line(path: &Path, event: &Event) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let result = (|| -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    })();
    let _ = file.unlock();
    result
}

/// Reads a JSONL file, tolerating a truncated final line (the tail may be
/// mid-write if the daemon crashed): a JSON-parse failure strictly on the
/// last line is logged and skipped rather than propagated. A parse failure
/// anywhere else in the file is treated as mid-file corruption and fails
/// hard, since that can only mean the file was touched out of band.
fn read_jsonl(path: &Path) -> Result<Vec<Event>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;

    let mut events = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(line) {
            Ok(event) => events.push(event),
            Err(e) if idx == lines.len() - 1 => {
                warn!(path = %path.display(), error = %e, "skipping truncated tail line");
            }
            Err(e) => {
                return Err(StorageError::Corrupt {
                    path: path.display().to_string(),
                    detail: format!("line {}: {e}", idx + 1),
                });
            }
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use thrum_core::{AgentId, EventPayload};
    use tempfile::tempdir;

    fn sample_event(seq: u64) -> Event {
        Event {
            event_id: format!("evt-{seq}"),
            sequence: seq,
            timestamp: Utc::now(),
            origin_daemon: "dmn-local".into(),
            payload: EventPayload::AgentRegister {
                agent_id: AgentId::new(),
                name: "impl1".into(),
                role: "implementer".into(),
                module: "auth".into(),
                display: None,
                hostname: "host1".into(),
                public_key: None,
            },
        }
    }

    #[test]
    fn append_and_read_back_round_trips() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        log.append(&sample_event(1), None).unwrap();
        log.append(&sample_event(2), None).unwrap();
        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 1);
    }

    #[test]
    fn truncated_tail_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        log.append(&sample_event(1), None).unwrap();

        let mut file = OpenOptions::new().append(true).open(events_path(dir.path())).unwrap();
        file.write_all(b"{\"event_id\":\"evt-2\",\"sequence\":2").unwrap();

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 1);
    }
}
