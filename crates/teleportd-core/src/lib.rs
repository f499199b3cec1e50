// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session, event, and error types shared by every orchestrator crate.

mod bus;
mod error;
mod events;
mod session;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use error::OrchestratorError;
pub use events::{OrchestratorEvent, QuestionItem};
pub use session::{
    AgentHandle, ContextUsage, Mode, PendingPermission, PendingQuestion, PermissionDecision,
    Session, SessionUsage,
};
