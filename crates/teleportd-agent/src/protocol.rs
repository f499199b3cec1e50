// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Deserialize;
use serde_json::Value;
use teleportd_core::{OrchestratorEvent, QuestionItem};

/// Tool names whose `AskUserQuestion` shape is handled as a `Question`
/// event rather than rendered like an ordinary tool call (§4.2).
const ASK_USER_QUESTION: &str = "AskUserQuestion";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawMessage {
    Assistant { message: BlockContainer },
    User { message: BlockContainer },
    Result(ResultMarker),
    System {},
}

#[derive(Debug, Deserialize)]
struct BlockContainer {
    content: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Deserialize)]
pub struct ResultMarker {
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub usage: ResultUsage,
    #[serde(default)]
    pub num_turns: u64,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Outcome of translating one line of the agent's JSON-lines stream.
pub enum Translated {
    /// Ordinary events to forward on the session's bus.
    Events(Vec<OrchestratorEvent>),
    /// The turn-terminal "result" marker: accounting update, not itself an
    /// `OrchestratorEvent`.
    Result(ResultMarker),
    /// A line that carries no session-visible content (e.g. `system`).
    Ignored,
}

/// Translates one JSON-lines message from the external agent process into
/// the internal event taxonomy. `AskUserQuestion` tool calls are converted
/// to `Question` events rather than rendered as a tool call.
pub fn translate_line(session_id: &str, line: &str) -> Result<Translated, serde_json::Error> {
    let raw: RawMessage = serde_json::from_str(line)?;
    Ok(match raw {
        RawMessage::System {} => Translated::Ignored,
        RawMessage::Result(marker) => Translated::Result(marker),
        RawMessage::Assistant { message } => {
            Translated::Events(translate_assistant_blocks(session_id, message.content))
        }
        RawMessage::User { message } => {
            Translated::Events(translate_user_blocks(session_id, message.content))
        }
    })
}

fn translate_assistant_blocks(session_id: &str, blocks: Vec<Block>) -> Vec<OrchestratorEvent> {
    blocks
        .into_iter()
        .map(|block| match block {
            Block::Text { text } => OrchestratorEvent::Text {
                session_id: session_id.to_string(),
                content: text,
                is_final: false,
            },
            Block::ToolUse { id, name, input } if name == ASK_USER_QUESTION => {
                let questions = input
                    .get("questions")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(parse_question_item).collect())
                    .unwrap_or_default();
                OrchestratorEvent::Question {
                    session_id: session_id.to_string(),
                    question_id: id,
                    questions,
                }
            }
            Block::ToolUse { id, name, input } => OrchestratorEvent::ToolCall {
                session_id: session_id.to_string(),
                tool_id: id,
                tool_name: name,
                input,
            },
            Block::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => OrchestratorEvent::ToolResult {
                session_id: session_id.to_string(),
                tool_id: tool_use_id,
                content: flatten_tool_result_content(&content),
                is_error,
            },
        })
        .collect()
}

fn parse_question_item(q: &Value) -> Option<QuestionItem> {
    let question = q.get("question").and_then(Value::as_str)?.to_string();
    let header = q.get("header").and_then(Value::as_str).map(str::to_string);
    let options = q
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.get("label").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(QuestionItem {
        header,
        question,
        options,
    })
}

fn translate_user_blocks(session_id: &str, blocks: Vec<Block>) -> Vec<OrchestratorEvent> {
    translate_assistant_blocks(session_id, blocks)
}

fn flatten_tool_result_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        other if other.is_null() => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_text_block() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#;
        match translate_line("s1", line).unwrap() {
            Translated::Events(events) => {
                assert_eq!(events.len(), 1);
                assert!(matches!(&events[0], OrchestratorEvent::Text { content, .. } if content == "hi"));
            }
            _ => panic!("expected events"),
        }
    }

    #[test]
    fn translates_tool_use_block() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}"#;
        match translate_line("s1", line).unwrap() {
            Translated::Events(events) => {
                assert!(matches!(&events[0], OrchestratorEvent::ToolCall { tool_name, .. } if tool_name == "Bash"));
            }
            _ => panic!("expected events"),
        }
    }

    #[test]
    fn ask_user_question_becomes_a_question_event_not_a_tool_call() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"AskUserQuestion","input":{"questions":[{"header":"Confirm","question":"Proceed?","options":[{"label":"Yes"},{"label":"No"}]}]}}]}}"#;
        match translate_line("s1", line).unwrap() {
            Translated::Events(events) => {
                assert_eq!(events.len(), 1);
                match &events[0] {
                    OrchestratorEvent::Question { questions, .. } => {
                        assert_eq!(questions.len(), 1);
                        assert_eq!(questions[0].question, "Proceed?");
                        assert_eq!(questions[0].header.as_deref(), Some("Confirm"));
                        assert_eq!(questions[0].options, vec!["Yes".to_string(), "No".to_string()]);
                    }
                    other => panic!("expected Question, got {other:?}"),
                }
            }
            _ => panic!("expected events"),
        }
    }

    #[test]
    fn translates_tool_result_with_array_content() {
        let line = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"ok"}],"is_error":false}]}}"#;
        match translate_line("s1", line).unwrap() {
            Translated::Events(events) => {
                assert!(matches!(&events[0], OrchestratorEvent::ToolResult { content, is_error, .. } if content == "ok" && !is_error));
            }
            _ => panic!("expected events"),
        }
    }

    #[test]
    fn translates_result_marker() {
        let line = r#"{"type":"result","total_cost_usd":0.05,"usage":{"input_tokens":100,"output_tokens":50},"num_turns":1}"#;
        match translate_line("s1", line).unwrap() {
            Translated::Result(marker) => {
                assert_eq!(marker.total_cost_usd, 0.05);
                assert_eq!(marker.usage.input_tokens, 100);
            }
            _ => panic!("expected result marker"),
        }
    }

    #[test]
    fn system_line_is_ignored() {
        let line = r#"{"type":"system"}"#;
        assert!(matches!(translate_line("s1", line).unwrap(), Translated::Ignored));
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(translate_line("s1", "not json").is_err());
    }
}
