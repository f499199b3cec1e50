// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The bot's command surface (§4.9): `/start /new /cc /status /mode
//! [arg] /model [arg] /cost /context /compact /todos /stop /cancel
//! /link <token>`.
//!
//! `/mode`, `/model`, and `/link` take a free-form trailing argument that
//! `teloxide`'s derive-based arity matching doesn't model well for an
//! *optional* single field, so their argument is parsed out of the raw
//! message text by [`trailing_arg`] instead of by the derive macro.

use teloxide::utils::command::BotCommands;

#[derive(Debug, Clone, Copy, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "show auth status and the command list")]
    Start,
    #[command(description = "start a fresh, un-resumed session")]
    New,
    #[command(description = "return the active session to the terminal")]
    Cc,
    #[command(description = "show session status")]
    Status,
    #[command(description = "show or set the permission mode")]
    Mode,
    #[command(description = "show or set the model")]
    Model,
    #[command(description = "show cumulative cost")]
    Cost,
    #[command(description = "show context-window usage")]
    Context,
    #[command(description = "compact the conversation")]
    Compact,
    #[command(description = "list current todos")]
    Todos,
    #[command(description = "interrupt the in-flight turn")]
    Stop,
    #[command(description = "cancel a pending teleport, or disconnect")]
    Cancel,
    #[command(description = "complete a setup-link rendezvous")]
    Link,
}

/// Everything after the command word and its following whitespace, or
/// `None` if there is no argument. `"/mode plan"` -> `Some("plan")`;
/// `"/mode"` -> `None`.
pub fn trailing_arg(text: &str) -> Option<&str> {
    let rest = text.splitn(2, char::is_whitespace).nth(1)?;
    let trimmed = rest.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_command() {
        let cmd = Command::parse("/status", "bot").unwrap();
        assert!(matches!(cmd, Command::Status));
    }

    #[test]
    fn trailing_arg_extracts_text_after_command() {
        assert_eq!(trailing_arg("/mode plan"), Some("plan"));
    }

    #[test]
    fn trailing_arg_is_none_with_no_argument() {
        assert_eq!(trailing_arg("/mode"), None);
        assert_eq!(trailing_arg("/mode   "), None);
    }

    #[test]
    fn trailing_arg_trims_surrounding_whitespace() {
        assert_eq!(trailing_arg("/link   ABC123  "), Some("ABC123"));
    }
}
