// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Git-backed sync transport (§4.9): an alternative to the WebSocket pull
//! path for repos that already share state over `git push`/`git fetch`
//! rather than a reachable peer address. Events live as JSONL lines on an
//! orphan branch (`a-sync`); applying them is idempotent (each line is
//! keyed by `event_id`), so a three-way merge never needs real conflict
//! resolution beyond "union the lines, keep both".

use crate::state::State;
use git2::{Oid, Repository, Signature};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use thrum_core::Event;
use tokio_util::sync::CancellationToken;

pub const SYNC_BRANCH: &str = "a-sync";
const LOG_BLOB_PATH: &str = "events.jsonl";

#[derive(Debug, Error)]
pub enum GitBridgeError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("event serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

pub struct GitBridge {
    repo: Repository,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    pub committed: u64,
    pub commit_id: Option<String>,
}

impl GitBridge {
    /// Opens the repo at `path` and ensures `a-sync` exists as an orphan
    /// branch (no shared history with the repo's normal branches, since it
    /// carries daemon state rather than source).
    pub fn open(path: &Path) -> Result<Self, GitBridgeError> {
        let repo = Repository::open(path)?;
        let bridge = Self { repo };
        bridge.ensure_sync_branch()?;
        Ok(bridge)
    }

    fn ensure_sync_branch(&self) -> Result<(), GitBridgeError> {
        if self.repo.find_branch(SYNC_BRANCH, git2::BranchType::Local).is_ok() {
            return Ok(());
        }

        let signature = daemon_signature()?;
        let tree_id = {
            let tree_builder = self.repo.treebuilder(None)?;
            tree_builder.write()?
        };
        let tree = self.repo.find_tree(tree_id)?;
        let commit_id = self.repo.commit(None, &signature, &signature, "sync: initialize", &tree, &[])?;
        self.repo.branch(SYNC_BRANCH, &self.repo.find_commit(commit_id)?, false)?;
        Ok(())
    }

    /// Reads every event line already committed on `a-sync`, keyed by
    /// `event_id`, so the caller can skip events it already has.
    pub fn known_event_ids(&self) -> Result<Vec<String>, GitBridgeError> {
        let Some(blob) = self.read_log_blob()? else { return Ok(Vec::new()) };
        let text = String::from_utf8_lossy(&blob);
        let mut ids = Vec::new();
        for line in text.lines() {
            if let Ok(event) = serde_json::from_str::<Event>(line) {
                ids.push(event.event_id);
            }
        }
        Ok(ids)
    }

    fn read_log_blob(&self) -> Result<Option<Vec<u8>>, GitBridgeError> {
        let branch = self.repo.find_branch(SYNC_BRANCH, git2::BranchType::Local)?;
        let commit = branch.get().peel_to_commit()?;
        let tree = commit.tree()?;
        match tree.get_path(Path::new(LOG_BLOB_PATH)) {
            Ok(entry) => {
                let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
                Ok(Some(blob.content().to_vec()))
            }
            Err(_) => Ok(None),
        }
    }

    /// Appends `new_events` (already deduplicated against
    /// [`known_event_ids`] by the caller) to the log blob and commits.
    /// Does nothing and returns a zero [`PushOutcome`] if `new_events` is
    /// empty, since an empty commit would just noise up the branch.
    pub fn commit_events(&self, new_events: &[Event]) -> Result<PushOutcome, GitBridgeError> {
        if new_events.is_empty() {
            return Ok(PushOutcome::default());
        }

        let mut contents = self.read_log_blob()?.unwrap_or_default();
        for event in new_events {
            contents.extend_from_slice(serde_json::to_string(event)?.as_bytes());
            contents.push(b'\n');
        }

        let branch = self.repo.find_branch(SYNC_BRANCH, git2::BranchType::Local)?;
        let parent = branch.get().peel_to_commit()?;
        let blob_id = self.repo.blob(&contents)?;

        let mut tree_builder = self.repo.treebuilder(Some(&parent.tree()?))?;
        tree_builder.insert(LOG_BLOB_PATH, blob_id, 0o100644)?;
        let tree_id = tree_builder.write()?;
        let tree = self.repo.find_tree(tree_id)?;

        let signature = daemon_signature()?;
        let max_sequence = new_events.iter().map(|e| e.sequence).max().unwrap_or(0);
        let message = format!("sync: {} events up to seq {}", new_events.len(), max_sequence);
        let ref_name = format!("refs/heads/{SYNC_BRANCH}");
        let commit_id = self.repo.commit(
            Some(ref_name.as_str()),
            &signature,
            &signature,
            &message,
            &tree,
            &[&parent],
        )?;

        Ok(PushOutcome { committed: new_events.len() as u64, commit_id: Some(commit_id_to_string(commit_id)) })
    }

    /// Fetches `a-sync` from `remote_name` and fast-forwards the local
    /// branch. Real conflicting histories (two daemons committing before
    /// either fetched) are resolved by keeping both commits as parents of a
    /// merge commit rather than rebasing, since the log is append-only and
    /// union-safe.
    pub fn fetch_and_merge(&self, remote_name: &str) -> Result<(), GitBridgeError> {
        let mut remote = self.repo.find_remote(remote_name)?;
        remote.fetch(&[SYNC_BRANCH], None, None)?;

        let remote_ref = format!("refs/remotes/{remote_name}/{SYNC_BRANCH}");
        let Ok(remote_branch) = self.repo.find_reference(&remote_ref) else { return Ok(()) };
        let remote_commit = remote_branch.peel_to_commit()?;

        let mut local_branch = self.repo.find_branch(SYNC_BRANCH, git2::BranchType::Local)?;
        let local_commit = local_branch.get().peel_to_commit()?;

        if local_commit.id() == remote_commit.id() {
            return Ok(());
        }

        let (analysis, _) = self.repo.merge_analysis(&[&self.repo.find_annotated_commit(remote_commit.id())?])?;
        if analysis.is_fast_forward() {
            local_branch.get_mut().set_target(remote_commit.id(), "sync: fast-forward")?;
            return Ok(());
        }

        let signature = daemon_signature()?;
        let base = self.repo.merge_base(local_commit.id(), remote_commit.id())?;
        let base_tree = self.repo.find_commit(base)?.tree()?;
        let mut index = self.repo.merge_trees(&base_tree, &local_commit.tree()?, &remote_commit.tree()?, None)?;
        let merged_tree_id = index.write_tree_to(&self.repo)?;
        let merged_tree = self.repo.find_tree(merged_tree_id)?;

        let ref_name = format!("refs/heads/{SYNC_BRANCH}");
        self.repo.commit(
            Some(ref_name.as_str()),
            &signature,
            &signature,
            "sync: merge",
            &merged_tree,
            &[&local_commit, &remote_commit],
        )?;
        Ok(())
    }

    /// Pushes `a-sync` to `remote_name`. Network auth is left to the
    /// ambient git credential helper; no callback is registered here.
    pub fn push(&self, remote_name: &str) -> Result<(), GitBridgeError> {
        let mut remote = self.repo.find_remote(remote_name)?;
        let refspec = format!("refs/heads/{SYNC_BRANCH}:refs/heads/{SYNC_BRANCH}");
        remote.push(&[refspec.as_str()], None)?;
        Ok(())
    }
}

/// Drives the commit/fetch/merge/push cycle on `interval` until `shutdown`
/// fires. `git2::Repository` is `Send` but not `Sync`, so each round runs
/// inside `spawn_blocking`, handing `bridge` back to the loop afterward
/// rather than holding it across an `.await`.
pub async fn run_periodic(
    mut bridge: GitBridge,
    state: Arc<State>,
    remote_name: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                let events = match state.read_all_events() {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(error = %e, "git sync bridge: could not read event log");
                        continue;
                    }
                };
                let remote = remote_name.clone();
                let round = tokio::task::spawn_blocking(move || -> Result<GitBridge, GitBridgeError> {
                    let known: HashSet<String> = bridge.known_event_ids()?.into_iter().collect();
                    let new_events: Vec<Event> = events.into_iter().filter(|e| !known.contains(&e.event_id)).collect();
                    bridge.commit_events(&new_events)?;
                    bridge.fetch_and_merge(&remote)?;
                    bridge.push(&remote)?;
                    Ok(bridge)
                })
                .await;

                match round {
                    Ok(Ok(returned)) => bridge = returned,
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "git sync bridge round failed, stopping");
                        return;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "git sync bridge task panicked, stopping");
                        return;
                    }
                }
            }
        }
    }
}

fn commit_id_to_string(id: Oid) -> String {
    id.to_string()
}

fn daemon_signature() -> Result<Signature<'static>, git2::Error> {
    let hostname = hostname_string();
    Signature::now("Thrum Daemon", &format!("thrum@{hostname}"))
}

fn hostname_string() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Repository as Git2Repository;
    use tempfile::tempdir;
    use thrum_core::{AgentId, EventPayload};

    fn init_repo(path: &Path) -> Git2Repository {
        let repo = Git2Repository::init(path).unwrap();
        let signature = Signature::now("Test", "test@example.com").unwrap();
        let tree_id = { repo.treebuilder(None).unwrap().write().unwrap() };
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[]).unwrap();
        repo
    }

    fn sample_event(seq: u64) -> Event {
        Event {
            event_id: format!("evt-{seq}"),
            sequence: seq,
            timestamp: chrono::Utc::now(),
            origin_daemon: "dmn-test".into(),
            payload: EventPayload::AgentDeregister { agent_id: AgentId::new() },
        }
    }

    #[test]
    fn ensures_orphan_sync_branch_on_open() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let bridge = GitBridge::open(dir.path()).unwrap();
        assert!(bridge.known_event_ids().unwrap().is_empty());
    }

    #[test]
    fn commit_events_appends_and_dedupes_by_id() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let bridge = GitBridge::open(dir.path()).unwrap();

        let outcome = bridge.commit_events(&[sample_event(1), sample_event(2)]).unwrap();
        assert_eq!(outcome.committed, 2);

        let ids = bridge.known_event_ids().unwrap();
        assert_eq!(ids, vec!["evt-1".to_string(), "evt-2".to_string()]);
    }

    #[test]
    fn commit_events_is_a_noop_for_an_empty_batch() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        let bridge = GitBridge::open(dir.path()).unwrap();
        let outcome = bridge.commit_events(&[]).unwrap();
        assert_eq!(outcome, PushOutcome::default());
    }
}
