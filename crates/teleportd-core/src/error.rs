// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Errors shared across session, event, and bus operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {0} already has a pending permission")]
    PermissionAlreadyPending(String),

    #[error("session {0} already has a pending question")]
    QuestionAlreadyPending(String),

    #[error("session {0} has no live agent handle")]
    NoAgentHandle(String),

    #[error("no chat identity is authorized to drive this orchestrator")]
    Unauthorized,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
