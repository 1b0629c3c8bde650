// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Method handlers, grouped by domain (§4.7). Each function takes the
//! connection context plus raw `params` and returns the JSON result value;
//! `rpc::dispatch` wraps that in the JSON-RPC envelope.

pub mod agent;
pub mod groups;
pub mod health;
pub mod messaging;
pub mod subscribe;
pub mod sync;

use serde::de::DeserializeOwned;
use thrum_core::ThrumError;

pub(crate) fn parse_params<T: DeserializeOwned + Default>(
    params: Option<serde_json::Value>,
) -> Result<T, ThrumError> {
    match params {
        Some(value) => serde_json::from_value(value)
            .map_err(|e| ThrumError::invalid_argument(format!("bad params: {e}"))),
        None => Ok(T::default()),
    }
}

pub(crate) fn require_params<T: DeserializeOwned>(
    params: Option<serde_json::Value>,
) -> Result<T, ThrumError> {
    let value = params.ok_or_else(|| ThrumError::invalid_argument("missing params"))?;
    serde_json::from_value(value).map_err(|e| ThrumError::invalid_argument(format!("bad params: {e}")))
}
