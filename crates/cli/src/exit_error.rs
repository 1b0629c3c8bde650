// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Error type that carries a process exit code so `main()` can choose the
//! exit status without every command calling `std::process::exit()`
//! directly.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}
