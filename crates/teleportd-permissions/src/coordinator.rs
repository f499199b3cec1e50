// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;
use teleportd_core::Mode;

use crate::rules::AllowList;

const APPROVAL_REQUIRED_TOOLS: &[&str] = &["Edit", "Write", "Bash", "NotebookEdit"];
const EDIT_TOOLS: &[&str] = &["Edit", "Write", "NotebookEdit", "MultiEdit"];

/// Outcome of the non-interactive steps of permission evaluation (§4.3
/// steps 1-4). `NeedsApproval` hands control to whichever caller owns the
/// session's pending-permission slot and the chat UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoDecision {
    Allow,
    NeedsApproval,
}

/// Gates a tool invocation against mode and the cached allow-list, without
/// itself blocking on interactive approval.
#[derive(Debug, Default)]
pub struct PermissionCoordinator;

impl PermissionCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Steps 1-4 of the approval algorithm.
    pub fn check(&self, mode: Mode, tool_name: &str, input: &Value, cwd: &str) -> AutoDecision {
        if mode == Mode::BypassPermissions {
            return AutoDecision::Allow;
        }
        if mode == Mode::AcceptEdits && EDIT_TOOLS.contains(&tool_name) {
            return AutoDecision::Allow;
        }
        if !APPROVAL_REQUIRED_TOOLS.contains(&tool_name) {
            return AutoDecision::Allow;
        }
        if AllowList::for_cwd(cwd).allows(tool_name, input) {
            return AutoDecision::Allow;
        }
        AutoDecision::NeedsApproval
    }
}
