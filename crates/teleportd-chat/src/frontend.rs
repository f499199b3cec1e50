// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The [`ChatFrontend`] abstraction and its `teloxide`-backed Telegram
//! implementation (§4.9).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use teleportd_core::{Mode, QuestionItem};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use tokio::sync::Mutex;
use tracing::warn;

use crate::format;
use crate::keyboard;

/// Opaque reference to a sent message, for later editing. Mirrors the
/// original's `(message_id, text)` tuple so a tool result can be appended
/// to the call that produced it.
#[derive(Debug, Clone)]
pub struct MessageHandle {
    pub message_id: MessageId,
    pub text: String,
}

/// Thin layer above the chat SDK: rendering, message-handle bookkeeping,
/// and notification-sound suppression rules. Owns no orchestration state
/// — that lives in [`crate::engine::ChatEngine`].
#[async_trait]
pub trait ChatFrontend: Send + Sync {
    async fn send_text(&self, session_id: &str, text: &str, is_final: bool);

    /// Renders a tool call, returning a handle the caller should retain
    /// for the eventual `send_tool_result` call. `None` for tools (like
    /// `AskUserQuestion`) that don't render as ordinary tool calls.
    async fn send_tool_call(&self, session_id: &str, tool_id: &str, tool_name: &str, input: &Value) -> Option<MessageHandle>;

    /// Appends the result to the message `send_tool_call` produced, or
    /// sends a standalone message if no handle is available (e.g. after a
    /// reload dropped the in-memory map).
    async fn send_tool_result(&self, session_id: &str, tool_id: &str, content: &str, is_error: bool, handle: Option<MessageHandle>);

    async fn request_permission(&self, session_id: &str, tool_name: &str, input: &Value);

    async fn request_question(&self, session_id: &str, q_idx: usize, item: &QuestionItem);

    /// Updates (or first-creates and pins) the per-session pinned status
    /// message.
    async fn update_status(&self, session_id: &str, mode: Mode, model: Option<&str>, context_percent: u8, total_cost_usd: f64);

    async fn notify_teleport(&self, chat_identity: &str, cwd: &str);
}

/// Per-session bookkeeping a Telegram-backed frontend needs: the tool-id
/// -> message map for result editing, and the pinned status message id.
#[derive(Default)]
struct SessionState {
    tool_messages: HashMap<String, MessageHandle>,
    pinned_message: Option<MessageId>,
}

/// Single-tenant Telegram frontend: one authorized chat id, matching
/// §1's "single permitted identity" scope.
pub struct TelegramFrontend {
    bot: Bot,
    allowed_chat_id: ChatId,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl TelegramFrontend {
    pub fn new(bot: Bot, allowed_chat_id: i64) -> Self {
        Self {
            bot,
            allowed_chat_id: ChatId(allowed_chat_id),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn allowed_chat_id(&self) -> ChatId {
        self.allowed_chat_id
    }
}

#[async_trait]
impl ChatFrontend for TelegramFrontend {
    async fn send_text(&self, _session_id: &str, text: &str, is_final: bool) {
        if text.trim().is_empty() {
            return;
        }
        let html = teleportd_agent::markdown_to_chat_html(text);
        let chunks = format::split_text(&html, format::MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.trim().is_empty() {
                continue;
            }
            let silent = !(i == last && is_final);
            let sent = self
                .bot
                .send_message(self.allowed_chat_id, chunk)
                .parse_mode(ParseMode::Html)
                .disable_notification(silent)
                .await;
            if let Err(err) = sent {
                warn!(%err, "failed to send HTML message, falling back to plain text");
                let plain = strip_html_tags(chunk);
                if let Err(err) = self
                    .bot
                    .send_message(self.allowed_chat_id, truncate_chars(&plain, format::MAX_MESSAGE_LENGTH))
                    .disable_notification(silent)
                    .await
                {
                    warn!(%err, "failed to send plain-text fallback message");
                }
            }
        }
    }

    async fn send_tool_call(&self, session_id: &str, tool_id: &str, tool_name: &str, input: &Value) -> Option<MessageHandle> {
        let text = format::format_tool_call(tool_name, input)?;
        match self
            .bot
            .send_message(self.allowed_chat_id, &text)
            .parse_mode(ParseMode::Html)
            .disable_notification(true)
            .await
        {
            Ok(msg) => {
                let handle = MessageHandle { message_id: msg.id, text };
                self.sessions
                    .lock()
                    .await
                    .entry(session_id.to_string())
                    .or_default()
                    .tool_messages
                    .insert(tool_id.to_string(), handle.clone());
                Some(handle)
            }
            Err(err) => {
                warn!(%err, tool_id, "failed to send tool call");
                None
            }
        }
    }

    async fn send_tool_result(&self, session_id: &str, tool_id: &str, content: &str, is_error: bool, handle: Option<MessageHandle>) {
        let Some(result_text) = format::format_tool_result(content, is_error) else {
            return;
        };

        let handle = match handle {
            Some(h) => Some(h),
            None => self
                .sessions
                .lock()
                .await
                .get(session_id)
                .and_then(|s| s.tool_messages.get(tool_id).cloned()),
        };

        if let Some(handle) = handle {
            let combined = format!("{}\n{result_text}", handle.text);
            if let Err(err) = self
                .bot
                .edit_message_text(self.allowed_chat_id, handle.message_id, &combined)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!(%err, tool_id, "failed to edit tool message, sending standalone result");
                self.send_standalone_result(&result_text).await;
            }
            return;
        }

        self.send_standalone_result(&result_text).await;
    }

    async fn request_permission(&self, _session_id: &str, tool_name: &str, input: &Value) {
        let text = format::format_permission_prompt(tool_name, input);
        let keyboard = keyboard::permission_keyboard(tool_name);
        if let Err(err) = self
            .bot
            .send_message(self.allowed_chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .disable_notification(false)
            .await
        {
            warn!(%err, "failed to send permission prompt");
        }
    }

    async fn request_question(&self, _session_id: &str, q_idx: usize, item: &QuestionItem) {
        let header = item.header.as_deref().unwrap_or("Question");
        let text = format!("<b>{}:</b> {}", teleportd_agent::escape_html(header), teleportd_agent::escape_html(&item.question));
        let keyboard = keyboard::question_keyboard(q_idx, item);
        if let Err(err) = self
            .bot
            .send_message(self.allowed_chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .disable_notification(false)
            .await
        {
            warn!(%err, "failed to send question prompt");
        }
    }

    async fn update_status(&self, session_id: &str, mode: Mode, model: Option<&str>, context_percent: u8, total_cost_usd: f64) {
        let text = format::format_pinned_status(mode, model, context_percent, total_cost_usd);
        let pinned = self
            .sessions
            .lock()
            .await
            .get(session_id)
            .and_then(|s| s.pinned_message);

        if let Some(message_id) = pinned {
            if let Err(err) = self
                .bot
                .edit_message_text(self.allowed_chat_id, message_id, &text)
                .parse_mode(ParseMode::Html)
                .await
            {
                warn!(%err, session_id, "failed to update pinned status message");
            }
            return;
        }

        match self
            .bot
            .send_message(self.allowed_chat_id, &text)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(msg) => {
                if let Err(err) = self.bot.pin_chat_message(self.allowed_chat_id, msg.id).disable_notification(true).await {
                    warn!(%err, "failed to pin status message");
                }
                self.sessions
                    .lock()
                    .await
                    .entry(session_id.to_string())
                    .or_default()
                    .pinned_message = Some(msg.id);
            }
            Err(err) => warn!(%err, "failed to send status message"),
        }
    }

    async fn notify_teleport(&self, _chat_identity: &str, cwd: &str) {
        let text = format!(
            "\u{1F4F1} <b>Session teleported!</b>\n\nDirectory: <code>{}</code>\nSend a message to continue.",
            teleportd_agent::escape_html(cwd)
        );
        if let Err(err) = self
            .bot
            .send_message(self.allowed_chat_id, text)
            .parse_mode(ParseMode::Html)
            .disable_notification(false)
            .await
        {
            warn!(%err, "failed to send teleport notification");
        }
    }
}

#[async_trait]
impl teleportd_teleport::TeleportNotifier for TelegramFrontend {
    async fn notify_teleport(&self, chat_identity: &str, cwd: &str) {
        ChatFrontend::notify_teleport(self, chat_identity, cwd).await
    }
}

#[async_trait]
impl teleportd_teleport::ReloadNotifier for TelegramFrontend {
    async fn notify_reload_pending(&self) {
        if let Err(err) = self
            .bot
            .send_message(self.allowed_chat_id, "\u{1F504} A reload has been requested; it will proceed once every session is idle.")
            .disable_notification(false)
            .await
        {
            warn!(%err, "failed to send reload-pending notification");
        }
    }

    async fn notify_reloading(&self) {
        if let Err(err) = self
            .bot
            .send_message(self.allowed_chat_id, "\u{1F504} Reloading now, your session will resume momentarily.")
            .disable_notification(false)
            .await
        {
            warn!(%err, "failed to send reloading notification");
        }
    }
}

impl TelegramFrontend {
    async fn send_standalone_result(&self, text: &str) {
        if let Err(err) = self
            .bot
            .send_message(self.allowed_chat_id, text)
            .parse_mode(ParseMode::Html)
            .disable_notification(true)
            .await
        {
            warn!(%err, "failed to send standalone tool result");
        }
    }
}

fn strip_html_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_tags_removes_markup_only() {
        assert_eq!(strip_html_tags("<b>bold</b> and <code>code</code>"), "bold and code");
    }

    #[test]
    fn truncate_chars_caps_length() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
