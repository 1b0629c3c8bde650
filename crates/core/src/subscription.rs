// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Live subscriptions: a session's standing request for notification fan-out.

use crate::define_id;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};

define_id! {
    pub struct SubscriptionId("sub-");
}

pub const DEFAULT_BUFFER_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Scope,
    Mention,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Filter {
    pub fn all() -> Self {
        Self { filter_type: FilterType::All, value: None }
    }
}

/// A live subscription, scoped to the session's lifetime: torn down on
/// session end or transport close, never persisted past that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: SubscriptionId,
    pub session_id: SessionId,
    pub filter: Filter,
    pub buffer_limit: usize,
}
