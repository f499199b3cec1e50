// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// One item of a (possibly multi-step) `AskUserQuestion` prompt: the
/// question text, its button options, and an optional short header shown
/// above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
    pub header: Option<String>,
    pub question: String,
    pub options: Vec<String>,
}

/// Events published on a session's event bus. Tagged by `type` to match the
/// wire shape consumed by the SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    Text {
        session_id: String,
        content: String,
        is_final: bool,
    },
    ToolCall {
        session_id: String,
        tool_id: String,
        tool_name: String,
        input: serde_json::Value,
    },
    ToolResult {
        session_id: String,
        tool_id: String,
        content: String,
        is_error: bool,
    },
    Question {
        session_id: String,
        question_id: String,
        questions: Vec<QuestionItem>,
    },
    User {
        session_id: String,
        content: String,
    },
    SessionStart {
        session_id: String,
    },
    SessionEnd {
        session_id: String,
    },
    ReturnToTerminal {
        session_id: String,
        agent_session_id: String,
    },
    Superseded {
        session_id: String,
    },
    Error {
        session_id: String,
        message: String,
    },
}

impl OrchestratorEvent {
    /// The `session_id` every variant carries.
    pub fn session_id(&self) -> &str {
        match self {
            OrchestratorEvent::Text { session_id, .. }
            | OrchestratorEvent::ToolCall { session_id, .. }
            | OrchestratorEvent::ToolResult { session_id, .. }
            | OrchestratorEvent::Question { session_id, .. }
            | OrchestratorEvent::User { session_id, .. }
            | OrchestratorEvent::SessionStart { session_id }
            | OrchestratorEvent::SessionEnd { session_id }
            | OrchestratorEvent::ReturnToTerminal { session_id, .. }
            | OrchestratorEvent::Superseded { session_id }
            | OrchestratorEvent::Error { session_id, .. } => session_id,
        }
    }

    /// Closes the SSE consumer it is delivered to (§4.5).
    pub fn closes_consumer(&self) -> bool {
        matches!(
            self,
            OrchestratorEvent::ReturnToTerminal { .. } | OrchestratorEvent::Superseded { .. }
        )
    }

    pub fn superseded(session_id: impl Into<String>) -> Self {
        OrchestratorEvent::Superseded {
            session_id: session_id.into(),
        }
    }

    /// Synthetic event injected for a lossy consumer's next read (§4.5).
    pub fn lagged(session_id: impl Into<String>, skipped: u64) -> Self {
        OrchestratorEvent::Error {
            session_id: session_id.into(),
            message: format!("dropped {skipped} event(s) due to slow consumption"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_accessor_matches_every_variant() {
        let e = OrchestratorEvent::Text {
            session_id: "s1".into(),
            content: "hi".into(),
            is_final: true,
        };
        assert_eq!(e.session_id(), "s1");
    }

    #[test]
    fn return_to_terminal_and_superseded_close_the_consumer() {
        assert!(OrchestratorEvent::ReturnToTerminal {
            session_id: "s1".into(),
            agent_session_id: "a1".into(),
        }
        .closes_consumer());
        assert!(OrchestratorEvent::superseded("s1").closes_consumer());
        assert!(!OrchestratorEvent::SessionStart {
            session_id: "s1".into()
        }
        .closes_consumer());
    }

    #[test]
    fn serializes_with_snake_case_type_tag() {
        let e = OrchestratorEvent::ToolCall {
            session_id: "s1".into(),
            tool_id: "t1".into(),
            tool_name: "Bash".into(),
            input: serde_json::json!({"command": "ls"}),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "tool_call");
        assert_eq!(v["tool_name"], "Bash");
    }

    #[test]
    fn question_event_carries_options_per_item() {
        let e = OrchestratorEvent::Question {
            session_id: "s1".into(),
            question_id: "q1".into(),
            questions: vec![QuestionItem {
                header: Some("Confirm".into()),
                question: "Proceed?".into(),
                options: vec!["Yes".into(), "No".into()],
            }],
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["questions"][0]["options"][0], "Yes");
    }

    #[test]
    fn lagged_produces_an_error_event() {
        let e = OrchestratorEvent::lagged("s1", 3);
        match e {
            OrchestratorEvent::Error { message, .. } => assert!(message.contains('3')),
            _ => panic!("expected Error variant"),
        }
    }
}
