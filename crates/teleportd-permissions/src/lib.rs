// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool-call approval policy: mode gating, the project-local allow-list,
//! and Bash rule synthesis.

mod coordinator;
mod rules;
mod smart_rule;
mod tokenize;
mod validate;

/// Relative path of the project-local allow-list file inside a session's
/// working directory.
pub const ALLOW_LIST_RELATIVE_PATH: &str = ".claude/settings.local.json";

pub use coordinator::{AutoDecision, PermissionCoordinator};
pub use rules::{generate_permission_rule, AllowList};
pub use smart_rule::{generate_smart_bash_rule, BashRuleGenerator, SMART_RULE_SYSTEM_PROMPT};
pub use tokenize::shell_tokenize;
pub use validate::{is_pattern_too_broad, pattern_matches_command};
