// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! thrum-sync: peer-to-peer event replication (§4.8).
//!
//! Sync is receiver-driven and pull-based: this daemon periodically calls
//! `sync.pull` against each registered peer, validates what comes back in
//! three stages, applies accepted events to the local projection, and
//! advances a per-peer checkpoint. A lightweight push-notify hint lets a
//! peer skip waiting for the next poll interval, but carries no events
//! itself (§4.8, "fire-and-forget").

pub mod canonical;
pub mod checkpoint;
pub mod error;
pub mod pull;
pub mod rate_limiter;
pub mod registry;
pub mod validate;

pub use canonical::{canonical_bytes, canonicalize};
pub use checkpoint::list_all as list_all_checkpoints;
pub use error::{SyncError, ValidationError};
pub use pull::{pull_from_all_peers, pull_from_peer, PullResponse, PullSummary, SyncTransport};
pub use rate_limiter::{Admission, RateLimiter, DEFAULT_BURST, DEFAULT_QUEUE_DEPTH, DEFAULT_RATE_PER_SECOND};
pub use registry::PeerRegistry;
pub use validate::{validate, validate_business_logic, validate_message_body, validate_schema, validate_signature, SignaturePolicy, MAX_EVENT_BYTES};
