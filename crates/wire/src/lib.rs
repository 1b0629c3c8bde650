// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! thrum-wire: JSON-RPC 2.0 request/response types and line-delimited
//! framing shared by every transport (Unix socket, WebSocket).

mod error;
mod framing;
mod jsonrpc;
pub mod method;

pub use error::{code, ErrorObject, Warning};
pub use framing::{decode, encode, read_line, write_line, FramingError};
pub use jsonrpc::{Incoming, Notification, Request, RequestId, Response};
