// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::process::Stdio;

use async_trait::async_trait;
use teleportd_permissions::{BashRuleGenerator, SMART_RULE_SYSTEM_PROMPT};
use tokio::process::Command;

/// Delegates Bash rule synthesis to one fire-and-forget invocation of the
/// configured agent binary in single-turn, toolless mode (§4.3 "Rule
/// synthesis"), the same process used for ordinary conversation turns.
pub struct CliBashRuleGenerator {
    command: String,
}

impl CliBashRuleGenerator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl BashRuleGenerator for CliBashRuleGenerator {
    async fn generate_once(&self, command: &str) -> anyhow::Result<String> {
        let output = Command::new(&self.command)
            .arg("--print")
            .arg("--model")
            .arg("haiku")
            .arg("--max-turns")
            .arg("1")
            .arg("--system-prompt")
            .arg(SMART_RULE_SYSTEM_PROMPT)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("agent exited with status {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
