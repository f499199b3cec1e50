// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::bus::EventSender;

/// Permission modes matching the agent CLI's own set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Default
    }
}

impl Mode {
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Default => "default",
            Mode::AcceptEdits => "accept edits",
            Mode::Plan => "plan",
            Mode::BypassPermissions => "bypass permissions",
        }
    }
}

/// Resolution of a tool permission prompt, produced by a chat-side button
/// press or a policy auto-allow and consumed once by the permission
/// callback blocked on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PermissionDecision {
    Allow,
    AllowAlways,
    Deny { reason: Option<String> },
}

/// A tool permission request awaiting resolution. Resolved by sending a
/// [`PermissionDecision`] through `completion`, which consumes it.
#[derive(Debug)]
pub struct PendingPermission {
    pub request_id: String,
    pub tool_name: String,
    pub input_snapshot: serde_json::Value,
    completion: Option<oneshot::Sender<PermissionDecision>>,
}

impl PendingPermission {
    pub fn new(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        input_snapshot: serde_json::Value,
    ) -> (Self, oneshot::Receiver<PermissionDecision>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                request_id: request_id.into(),
                tool_name: tool_name.into(),
                input_snapshot,
                completion: Some(tx),
            },
            rx,
        )
    }

    /// Resolves the request. A second call is a no-op (consumed once).
    pub fn resolve(&mut self, decision: PermissionDecision) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(decision);
        }
    }
}

/// A multi-step `AskUserQuestion` form, advanced by button or free-text
/// answer and submitted to the agent as one concatenated reply once the
/// cursor reaches the end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub tool_invocation_id: String,
    pub questions: Vec<crate::events::QuestionItem>,
    pub answers: HashMap<String, String>,
    pub cursor: usize,
    /// Set while waiting for a free-text reply to the "other" option;
    /// cleared as soon as that reply is recorded.
    pub awaiting_custom_answer: bool,
}

impl PendingQuestion {
    pub fn new(
        tool_invocation_id: impl Into<String>,
        questions: Vec<crate::events::QuestionItem>,
    ) -> Self {
        Self {
            tool_invocation_id: tool_invocation_id.into(),
            questions,
            answers: HashMap::new(),
            cursor: 0,
            awaiting_custom_answer: false,
        }
    }

    pub fn current_question(&self) -> Option<&crate::events::QuestionItem> {
        self.questions.get(self.cursor)
    }

    /// Records an answer for the current question and advances the cursor.
    /// Returns `true` once the cursor has passed the last question.
    pub fn answer(&mut self, text: impl Into<String>) -> bool {
        if let Some(q) = self.questions.get(self.cursor).cloned() {
            self.answers.insert(q.question, text.into());
            self.cursor += 1;
        }
        self.awaiting_custom_answer = false;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.questions.len()
    }

    /// Joins every answer, in question order, as `"<question>: <answer>"`
    /// lines into one reply string (§4.4).
    pub fn concatenated_reply(&self) -> String {
        self.questions
            .iter()
            .filter_map(|q| self.answers.get(&q.question).map(|a| format!("{}: {a}", q.question)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tracks context-window usage, parsed from the agent's "Tokens: Xk / Yk
/// (Z%)" output line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContextUsage {
    pub tokens_used: u64,
    pub tokens_max: u64,
    pub percent_used: u8,
}

/// Cumulative cost/turn accounting for a session, updated from the agent's
/// terminal "result" marker each turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUsage {
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub num_turns: u64,
    pub last_response_cost: Option<f64>,
    pub last_response_tokens: Option<u64>,
}

/// Live handle to a connected agent process, owned opaquely by whichever
/// adapter implementation established it.
pub trait AgentHandle: Send + Sync {}

/// The unit of conversation state bridging a chat identity to an agent
/// conversation.
pub struct Session {
    pub id: String,
    pub agent_session_id: Option<String>,
    pub cwd: String,
    pub mode: Mode,
    pub current_model: Option<String>,
    pub terminal_id: Option<String>,

    pub agent_handle: Option<Box<dyn AgentHandle>>,
    pub is_processing: bool,

    pub pending_question: Option<PendingQuestion>,
    pub pending_permission: Option<PendingPermission>,
    pub waiting_for_rejection_reason: bool,
    pub waiting_for_question_answer: bool,

    pub usage: SessionUsage,
    pub context: ContextUsage,

    /// Tool-invocation-id → chat message handle that rendered the call, so
    /// the eventual result can be attached by editing that same message.
    pub tool_message_handles: HashMap<String, String>,

    events: EventSender,
}

impl Session {
    pub fn new(id: impl Into<String>, cwd: impl Into<String>, events: EventSender) -> Self {
        Self {
            id: id.into(),
            agent_session_id: None,
            cwd: cwd.into(),
            mode: Mode::default(),
            current_model: None,
            terminal_id: None,
            agent_handle: None,
            is_processing: false,
            pending_question: None,
            pending_permission: None,
            waiting_for_rejection_reason: false,
            waiting_for_question_answer: false,
            usage: SessionUsage::default(),
            context: ContextUsage::default(),
            tool_message_handles: HashMap::new(),
            events,
        }
    }

    /// Publishes an event to every listener on this session's bus.
    pub fn emit(&self, event: crate::events::OrchestratorEvent) {
        self.events.emit(event);
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Drops the agent handle without awaiting any async disconnect —
    /// releasing the reference lets the adapter finalize on its own so a
    /// concurrent permission callback never races a blocking teardown.
    pub fn release_agent_handle(&mut self) {
        self.agent_handle = None;
        self.is_processing = false;
        self.pending_question = None;
        self.pending_permission = None;
    }

    /// `true` when this session holds neither a pending question nor a
    /// pending permission and is not mid-turn.
    pub fn is_idle(&self) -> bool {
        !self.is_processing && self.pending_question.is_none() && self.pending_permission.is_none()
    }
}
