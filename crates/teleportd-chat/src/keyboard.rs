// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Inline keyboard builders for permission, question, mode, and model
//! prompts (§4.9). Callback-data strings are the wire contract with
//! [`crate::callback`] — keep the two in sync.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teleportd_core::{Mode, QuestionItem};

/// Tools whose edits a user may want to blanket-accept rather than
/// always-allow outright.
const EDIT_TOOLS: &[&str] = &["Edit", "Write", "NotebookEdit", "MultiEdit"];

/// `perm:{allow|always|accept_edits|reject}` keyboard. Edit-shaped tools
/// get an "Accept Edits" button in place of "Always".
pub fn permission_keyboard(tool_name: &str) -> InlineKeyboardMarkup {
    let top_row = if EDIT_TOOLS.contains(&tool_name) {
        vec![
            InlineKeyboardButton::callback("\u{2713} Allow", "perm:allow"),
            InlineKeyboardButton::callback("\u{1F4DD} Accept Edits", "perm:accept_edits"),
        ]
    } else {
        vec![
            InlineKeyboardButton::callback("\u{2713} Allow", "perm:allow"),
            InlineKeyboardButton::callback("\u{2713} Always", "perm:always"),
        ]
    };
    InlineKeyboardMarkup::new([
        top_row,
        vec![InlineKeyboardButton::callback("\u{2717} Reject", "perm:reject")],
    ])
}

/// `q:<q_idx>:<opt_idx|"other">` keyboard for one question item.
pub fn question_keyboard(q_idx: usize, question: &QuestionItem) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = question
        .options
        .iter()
        .enumerate()
        .map(|(opt_idx, label)| vec![InlineKeyboardButton::callback(label.clone(), format!("q:{q_idx}:{opt_idx}"))])
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "Other (type answer)",
        format!("q:{q_idx}:other"),
    )]);
    InlineKeyboardMarkup::new(rows)
}

const MODES: &[(Mode, &str)] = &[
    (Mode::Default, "\u{1F512} Default"),
    (Mode::AcceptEdits, "\u{1F4DD} Accept Edits"),
    (Mode::Plan, "\u{1F4CB} Plan Mode"),
    (Mode::BypassPermissions, "\u{26A0}\u{FE0F} Dangerous"),
];

fn mode_id(mode: Mode) -> &'static str {
    match mode {
        Mode::Default => "default",
        Mode::AcceptEdits => "acceptEdits",
        Mode::Plan => "plan",
        Mode::BypassPermissions => "bypassPermissions",
    }
}

/// `mode:<mode_id>` keyboard, marking the current mode with a leading dot.
pub fn mode_keyboard(current: Mode) -> InlineKeyboardMarkup {
    let rows = MODES
        .iter()
        .map(|(mode, label)| {
            let label = if *mode == current {
                format!("\u{2022} {label}")
            } else {
                label.to_string()
            };
            vec![InlineKeyboardButton::callback(label, format!("mode:{}", mode_id(*mode)))]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

const MODELS: &[(&str, &str, &str)] = &[
    ("sonnet", "\u{26A1} Sonnet", "Fast, balanced"),
    ("opus", "\u{1F9E0} Opus", "Most capable"),
    ("haiku", "\u{1F680} Haiku", "Fastest, lightweight"),
];

/// `model:<model_id>` keyboard, marking the current model with a leading dot.
pub fn model_keyboard(current: Option<&str>) -> InlineKeyboardMarkup {
    let current_lower = current.map(str::to_lowercase).unwrap_or_default();
    let rows = MODELS
        .iter()
        .map(|(id, label, desc)| {
            let display = if !current_lower.is_empty() && current_lower.contains(id) {
                format!("\u{2022} {label}")
            } else {
                label.to_string()
            };
            vec![InlineKeyboardButton::callback(
                format!("{display} - {desc}"),
                format!("model:{id}"),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buttons(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .map(|b| b.text.clone())
            .collect()
    }

    #[test]
    fn edit_tool_gets_accept_edits_button() {
        let markup = permission_keyboard("Edit");
        assert!(buttons(&markup).iter().any(|t| t.contains("Accept Edits")));
    }

    #[test]
    fn non_edit_tool_gets_always_button() {
        let markup = permission_keyboard("Bash");
        assert!(buttons(&markup).iter().any(|t| t.contains("Always")));
    }

    #[test]
    fn question_keyboard_has_one_button_per_option_plus_other() {
        let q = QuestionItem {
            header: None,
            question: "Proceed?".into(),
            options: vec!["Yes".into(), "No".into()],
        };
        let markup = question_keyboard(0, &q);
        assert_eq!(markup.inline_keyboard.len(), 3);
    }

    #[test]
    fn mode_keyboard_marks_current_mode() {
        let markup = mode_keyboard(Mode::Plan);
        assert!(buttons(&markup).iter().any(|t| t.starts_with("\u{2022}") && t.contains("Plan")));
    }

    #[test]
    fn model_keyboard_marks_current_model_case_insensitively() {
        let markup = model_keyboard(Some("claude-3-Opus-20240229"));
        assert!(buttons(&markup).iter().any(|t| t.starts_with("\u{2022}") && t.contains("Opus")));
    }

    #[test]
    fn model_keyboard_with_no_current_marks_nothing() {
        let markup = model_keyboard(None);
        assert!(!buttons(&markup).iter().any(|t| t.starts_with('\u{2022}')));
    }
}
