// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to launch agent process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("agent stdin closed")]
    StdinClosed,

    #[error("agent process exited unexpectedly")]
    ProcessExited,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
