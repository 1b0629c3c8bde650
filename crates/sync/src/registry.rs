// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! In-memory registry of known peer daemons. Bootstrapping a peer (first
//! contact, key exchange) is out of scope for the core crate per §4.8; this
//! only tracks peers an operator has already added.

use parking_lot::RwLock;
use std::collections::HashMap;
use thrum_core::{Peer, PeerDaemonId};

#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerDaemonId, Peer>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, peer: Peer) {
        self.peers.write().insert(peer.peer_daemon_id.clone(), peer);
    }

    pub fn remove(&self, peer_daemon_id: &PeerDaemonId) -> Option<Peer> {
        self.peers.write().remove(peer_daemon_id)
    }

    pub fn get(&self, peer_daemon_id: &PeerDaemonId) -> Option<Peer> {
        self.peers.read().get(peer_daemon_id).cloned()
    }

    pub fn list(&self) -> Vec<Peer> {
        self.peers.read().values().cloned().collect()
    }

    pub fn contains(&self, peer_daemon_id: &PeerDaemonId) -> bool {
        self.peers.read().contains_key(peer_daemon_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_peer(id: &str) -> Peer {
        Peer {
            peer_daemon_id: PeerDaemonId::from(id.to_string()),
            name: "peer-one".into(),
            address: "127.0.0.1:9000".into(),
            public_key: None,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn add_then_list_round_trips() {
        let registry = PeerRegistry::new();
        registry.add(sample_peer("prd-1"));
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn remove_drops_the_peer() {
        let registry = PeerRegistry::new();
        let peer = sample_peer("prd-1");
        registry.add(peer.clone());
        assert!(registry.remove(&peer.peer_daemon_id).is_some());
        assert!(!registry.contains(&peer.peer_daemon_id));
    }
}
