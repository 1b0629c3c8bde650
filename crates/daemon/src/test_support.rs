// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Shared fixture for handler tests: a fresh in-memory [`State`] plus a
//! [`ConnectionContext`] wired the way the transport layer builds one per
//! connection, without a socket in sight.

use crate::rpc::ConnectionContext;
use crate::state::State;
use crate::subscriptions::SubscriptionRegistry;
use chrono::Utc;
use std::sync::Arc;
use thrum_sync::{PeerRegistry, RateLimiter};

pub fn test_ctx() -> (ConnectionContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = State::open_in_memory_for_test(&dir.path().join("log"), "dmn-test".into()).unwrap();
    let ctx = ConnectionContext::new(
        Arc::new(state),
        Arc::new(SubscriptionRegistry::new()),
        Arc::new(PeerRegistry::new()),
        Arc::new(RateLimiter::with_defaults()),
        Utc::now(),
    );
    (ctx, dir)
}
