// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Renders tool calls, tool results, and permission prompts as chat HTML
//! (§4.9). Turn text itself goes through
//! [`teleportd_agent::markdown_to_chat_html`]; these helpers cover the
//! structured, tool-shaped messages that markdown alone doesn't describe.

use serde_json::Value;
use teleportd_agent::escape_html;
use teleportd_core::Mode;

/// Telegram's hard per-message character limit.
pub const MAX_MESSAGE_LENGTH: usize = 4096;
const RESULT_TRUNCATE_AT: usize = 2000;

fn str_field<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Formats a tool call for display. `None` for `AskUserQuestion`, which
/// renders as a question prompt instead of an ordinary tool message.
pub fn format_tool_call(tool_name: &str, input: &Value) -> Option<String> {
    Some(match tool_name {
        "Bash" => {
            let cmd = str_field(input, "command");
            let escaped = escape_html(cmd);
            if cmd.contains('\n') {
                format!("<pre><code class=\"language-bash\">{escaped}</code></pre>")
            } else {
                format!("<b>$</b> <code>{escaped}</code>")
            }
        }
        "Read" => format!("\u{1F4D6} <b>Reading</b> <code>{}</code>", escape_html(str_field(input, "file_path"))),
        "Write" => format!("\u{1F4DD} <b>Writing</b> <code>{}</code>", escape_html(str_field(input, "file_path"))),
        "Edit" => format!("\u{270F}\u{FE0F} <b>Editing</b> <code>{}</code>", escape_html(str_field(input, "file_path"))),
        "Glob" => format!("\u{1F50D} <b>Finding</b> <code>{}</code>", escape_html(str_field(input, "pattern"))),
        "Grep" => format!("\u{1F50E} <b>Searching</b> <code>{}</code>", escape_html(str_field(input, "pattern"))),
        "Task" => format!("\u{1F916} <b>Subagent:</b> {}", escape_html(str_field(input, "description"))),
        "WebFetch" => format!("\u{1F310} <b>Fetching</b> <code>{}</code>", escape_html(str_field(input, "url"))),
        "WebSearch" => format!("\u{1F50D} <b>Web search:</b> {}", escape_html(str_field(input, "query"))),
        "TodoWrite" => format_todo_write(input),
        "AskUserQuestion" => return None,
        other => format!("\u{1F527} <b>{}</b>", escape_html(other)),
    })
}

fn format_todo_write(input: &Value) -> String {
    let todos = input.get("todos").and_then(Value::as_array).cloned().unwrap_or_default();
    if todos.is_empty() {
        return "\u{1F4CB} <b>Clearing todos</b>".to_string();
    }
    let mut lines = vec!["\u{1F4CB} <b>Todos:</b>".to_string()];
    for todo in &todos {
        let status = todo.get("status").and_then(Value::as_str).unwrap_or("pending");
        let content = escape_html(todo.get("content").and_then(Value::as_str).unwrap_or(""));
        lines.push(match status {
            "completed" => format!("  \u{2705} <s>{content}</s>"),
            "in_progress" => format!("  \u{1F504} {content}"),
            _ => format!("  \u{2B1C} {content}"),
        });
    }
    lines.join("\n")
}

/// Formats a tool result. `None` for empty content, matching `format_tool_call`'s
/// `None`-for-nothing-to-show convention.
pub fn format_tool_result(content: &str, is_error: bool) -> Option<String> {
    if content.trim().is_empty() {
        return None;
    }
    let truncated = if content.len() > RESULT_TRUNCATE_AT {
        format!("{}\n...(truncated)", &content[..RESULT_TRUNCATE_AT])
    } else {
        content.to_string()
    };
    let escaped = escape_html(&truncated);

    Some(if content.contains('\n') || content.len() > 200 {
        let prefix = if is_error { "\u{274C} " } else { "" };
        if content.len() > 200 {
            format!("{prefix}<blockquote expandable>{escaped}</blockquote>")
        } else {
            format!("{prefix}<blockquote>{escaped}</blockquote>")
        }
    } else {
        let icon = if is_error { "\u{274C}" } else { "\u{2705}" };
        format!("{icon} {escaped}")
    })
}

fn truncated_preview(text: &str, max_len: usize) -> String {
    if text.len() > max_len {
        format!("{}...", &text[..max_len])
    } else {
        text.to_string()
    }
}

fn format_permission_edit(input: &Value) -> String {
    let file_path = escape_html(str_field(input, "file_path"));
    let old_display = escape_html(&truncated_preview(str_field(input, "old_string"), 500));
    let new_display = escape_html(&truncated_preview(str_field(input, "new_string"), 500));
    format!(
        "<b>\u{270F}\u{FE0F} Edit:</b> <code>{file_path}</code>\n\n\
         <b>Remove:</b>\n<pre>{old_display}</pre>\n\n\
         <b>Add:</b>\n<pre>{new_display}</pre>"
    )
}

fn format_permission_bash(input: &Value) -> String {
    let command = str_field(input, "command");
    let escaped_cmd = escape_html(command);
    let mut text = if command.contains('\n') {
        format!("<pre>{escaped_cmd}</pre>")
    } else {
        format!("<b>$</b> <code>{escaped_cmd}</code>")
    };
    let description = str_field(input, "description");
    if !description.is_empty() {
        text.push_str(&format!("\n\n<i>{}</i>", escape_html(description)));
    }
    text
}

fn format_permission_write(input: &Value) -> String {
    let file_path = escape_html(str_field(input, "file_path"));
    let preview = escape_html(&truncated_preview(str_field(input, "content"), 1000));
    format!(
        "<b>\u{1F4DD} Write:</b> <code>{file_path}</code>\n\n\
         <blockquote expandable><pre>{preview}</pre></blockquote>"
    )
}

fn format_permission_notebook(input: &Value) -> String {
    let notebook_path = escape_html(str_field(input, "notebook_path"));
    let cell_type = str_field(input, "cell_type");
    let cell_type = if cell_type.is_empty() { "code" } else { cell_type };
    let edit_mode = str_field(input, "edit_mode");
    let edit_mode = if edit_mode.is_empty() { "replace" } else { edit_mode };
    let preview = escape_html(&truncated_preview(str_field(input, "new_source"), 500));
    format!(
        "<b>\u{1F4D3} Notebook {edit_mode}:</b> <code>{notebook_path}</code>\n\
         Cell type: <code>{}</code>\n\n<pre>{preview}</pre>",
        escape_html(cell_type)
    )
}

/// Formats a permission request's body (the keyboard is built separately
/// by [`crate::keyboard::permission_keyboard`]).
pub fn format_permission_prompt(tool_name: &str, input: &Value) -> String {
    match tool_name {
        "Edit" => format_permission_edit(input),
        "Bash" => format_permission_bash(input),
        "Write" => format_permission_write(input),
        "NotebookEdit" => format_permission_notebook(input),
        other => {
            let pretty = serde_json::to_string_pretty(input).unwrap_or_default();
            format!(
                "<b>\u{1F527} {}</b>\n\n<pre>{}</pre>",
                escape_html(other),
                escape_html(&truncated_preview(&pretty, 1000))
            )
        }
    }
}

fn mode_icon(mode: Mode) -> &'static str {
    match mode {
        Mode::Default => "\u{1F512}",
        Mode::AcceptEdits => "\u{1F4DD}",
        Mode::Plan => "\u{1F4CB}",
        Mode::BypassPermissions => "\u{26A0}\u{FE0F}",
    }
}

/// Formats the pinned status message's content: mode, model, context %,
/// cumulative cost.
pub fn format_pinned_status(mode: Mode, current_model: Option<&str>, context_percent: u8, total_cost_usd: f64) -> String {
    let mut parts = vec![format!("{} <b>{}</b>", mode_icon(mode), mode.display_name())];
    parts.push(format!("<b>{}</b>", current_model.unwrap_or("default")));
    if context_percent > 0 {
        parts.push(format!("\u{1F4DD} {context_percent}%"));
    }
    if total_cost_usd > 0.0 {
        parts.push(format!("\u{1F4B0} ${total_cost_usd:.4}"));
    }
    parts.join(" | ")
}

/// Splits HTML-formatted text into chunks respecting Telegram's message
/// length cap, breaking only on line boundaries.
pub fn split_text(text: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split('\n') {
        if current.len() + line.len() + 1 > max_length {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = line.to_string();
        } else if current.is_empty() {
            current = line.to_string();
        } else {
            current.push('\n');
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
