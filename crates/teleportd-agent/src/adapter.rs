// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::json;
use teleportd_core::{AgentHandle as AgentHandleMarker, Mode};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::protocol::{translate_line, ResultMarker, Translated};
use crate::resume::can_resume_session;

/// One item of the per-turn stream an [`AgentConnection`] yields:
/// ordinary events plus the turn-terminal accounting marker (§4.2).
#[derive(Debug)]
pub enum StreamItem {
    Event(teleportd_core::OrchestratorEvent),
    TurnComplete(ResultMarker),
}

fn mode_flag(mode: Mode) -> &'static str {
    match mode {
        Mode::Default => "default",
        Mode::AcceptEdits => "acceptEdits",
        Mode::Plan => "plan",
        Mode::BypassPermissions => "bypassPermissions",
    }
}

/// A live connection to one external agent process for one session.
/// Implements [`AgentHandleMarker`] so it can be stored opaquely on a
/// `Session`.
pub struct AgentConnection {
    child: Child,
    stdin: ChildStdin,
    events: mpsc::Receiver<StreamItem>,
    reader_task: tokio::task::JoinHandle<()>,
}

impl AgentHandleMarker for AgentConnection {}

impl AgentConnection {
    /// Enqueues user input for the current turn. Returns immediately.
    pub async fn query(&mut self, text: &str) -> Result<(), AgentError> {
        let line = json!({"type": "user", "content": text}).to_string();
        self.write_line(&line).await
    }

    /// Cancels in-flight generation via a control message on stdin.
    pub async fn interrupt(&mut self) -> Result<(), AgentError> {
        self.write_line(&json!({"type": "control", "action": "interrupt"}).to_string())
            .await
    }

    pub async fn set_mode(&mut self, mode: Mode) -> Result<(), AgentError> {
        let line = json!({"type": "control", "action": "set_mode", "mode": mode_flag(mode)})
            .to_string();
        self.write_line(&line).await
    }

    pub async fn set_model(&mut self, model: &str) -> Result<(), AgentError> {
        let line =
            json!({"type": "control", "action": "set_model", "model": model}).to_string();
        self.write_line(&line).await
    }

    /// Forwards a resolved permission prompt for `tool_id` back to the
    /// process as a control message, the counterpart to the approval
    /// request it raised as an ordinary `tool_use` block (§4.3).
    pub async fn resolve_permission(
        &mut self,
        tool_id: &str,
        decision: &teleportd_core::PermissionDecision,
    ) -> Result<(), AgentError> {
        use teleportd_core::PermissionDecision::*;
        let line = match decision {
            Allow => json!({"type": "control", "action": "permission_decision", "tool_id": tool_id, "decision": "allow"}),
            AllowAlways => json!({"type": "control", "action": "permission_decision", "tool_id": tool_id, "decision": "allow_always"}),
            Deny { reason } => json!({"type": "control", "action": "permission_decision", "tool_id": tool_id, "decision": "deny", "reason": reason}),
        }
        .to_string();
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &str) -> Result<(), AgentError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|_| AgentError::StdinClosed)?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|_| AgentError::StdinClosed)?;
        Ok(())
    }

    /// Awaits the next item of the current turn's stream; `None` once the
    /// process has exited and the channel drains.
    pub async fn next_item(&mut self) -> Option<StreamItem> {
        self.events.recv().await
    }
}

impl Drop for AgentConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
        let _ = self.child.start_kill();
    }
}

/// Launches, queries, and streams events from the external AI agent
/// process (§4.2).
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    async fn connect(
        &self,
        session_id: &str,
        cwd: &str,
        resume_id: Option<&str>,
        mode: Mode,
    ) -> Result<AgentConnection, AgentError>;
}

/// Spawns the configured agent executable as a subprocess and speaks its
/// JSON-lines stream protocol over stdio.
pub struct ProcessAgentAdapter {
    command: String,
    args: Vec<String>,
}

impl ProcessAgentAdapter {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    fn spawn(&self, cwd: &str, resume_id: Option<&str>, mode: Mode) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg("--permission-mode")
            .arg(mode_flag(mode))
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(id) = resume_id {
            cmd.arg("--resume").arg(id);
        }
        cmd.spawn()
    }
}

#[async_trait]
impl AgentAdapter for ProcessAgentAdapter {
    async fn connect(
        &self,
        session_id: &str,
        cwd: &str,
        resume_id: Option<&str>,
        mode: Mode,
    ) -> Result<AgentConnection, AgentError> {
        let resumable = resume_id
            .map(|id| can_resume_session(id, cwd))
            .unwrap_or(false);
        let effective_resume = if resumable { resume_id } else { None };

        let mut child = match self.spawn(cwd, effective_resume, mode) {
            Ok(child) => child,
            Err(err) if effective_resume.is_some() => {
                warn!(%err, "agent spawn with resume failed, retrying fresh");
                self.spawn(cwd, None, mode).map_err(AgentError::Spawn)?
            }
            Err(err) => return Err(AgentError::Spawn(err)),
        };

        let stdin = child.stdin.take().ok_or(AgentError::StdinClosed)?;
        let stdout = child.stdout.take().ok_or(AgentError::ProcessExited)?;

        let (tx, rx) = mpsc::channel(256);
        let session_id = session_id.to_string();
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match translate_line(&session_id, &line) {
                        Ok(Translated::Events(events)) => {
                            for event in events {
                                if tx.send(StreamItem::Event(event)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Ok(Translated::Result(marker)) => {
                            if tx.send(StreamItem::TurnComplete(marker)).await.is_err() {
                                return;
                            }
                        }
                        Ok(Translated::Ignored) => {}
                        Err(err) => {
                            debug!(%err, line, "failed to translate agent output line");
                        }
                    },
                    Ok(None) => return,
                    Err(err) => {
                        debug!(%err, "error reading agent stdout");
                        return;
                    }
                }
            }
        });

        Ok(AgentConnection {
            child,
            stdin,
            events: rx,
            reader_task,
        })
    }
}
