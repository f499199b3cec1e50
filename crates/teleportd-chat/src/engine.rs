// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Orchestration layer: owns the session registry, permission and
//! teleport coordinators, and the agent adapter; wires chat commands and
//! callbacks to them (§4.9).
//!
//! Each connected session is driven by its own task (`run_agent_task`),
//! which owns the `AgentConnection` exclusively and multiplexes writer
//! commands against the reader stream with `tokio::select!`, the same
//! shape this codebase's gateway uses for its websocket bridge. Callers
//! reach a running task through an `mpsc::Sender<AgentCommand>` rather
//! than touching the connection directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use teleportd_agent::{AgentAdapter, AgentConnection, CliBashRuleGenerator, StreamItem};
use teleportd_core::{
    AgentHandle, Mode, OrchestratorEvent, PendingPermission, PermissionDecision, Session,
};
use teleportd_permissions::{generate_permission_rule, generate_smart_bash_rule, AllowList, AutoDecision, PermissionCoordinator};
use teleportd_teleport::{ReloadCoordinator, SessionManager, TeleportController, TeleportNotifier, TeleportRequest};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::callback::{CallbackAction, PermissionKind, QuestionChoice};
use crate::frontend::ChatFrontend;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// A permission prompt that cannot even be sent within this window fails
/// open rather than blocking the agent indefinitely (§4.9, §7).
const PERMISSION_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Smart Bash rule generation attempts before falling back to
/// `Bash(<basename>:*)` (§4.3 "Rule synthesis").
const SMART_BASH_RULE_RETRIES: u32 = 2;

fn mode_from_id(id: &str) -> Option<Mode> {
    match id {
        "default" => Some(Mode::Default),
        "acceptEdits" => Some(Mode::AcceptEdits),
        "plan" => Some(Mode::Plan),
        "bypassPermissions" => Some(Mode::BypassPermissions),
        _ => None,
    }
}

/// Opaque marker stored on `Session::agent_handle` so `Session::is_idle`
/// and the teleport/reload release paths work without `teleportd-core`
/// knowing about `teleportd-agent`. The real `AgentConnection` is owned
/// exclusively by this session's `run_agent_task`.
struct ConnectedMarker;
impl AgentHandle for ConnectedMarker {}

enum AgentCommand {
    Query(String),
    Interrupt,
    SetMode(Mode),
    SetModel(String),
    ResolvePermission { tool_id: String, decision: PermissionDecision },
}

/// Drives one authorized chat identity's session through the agent
/// adapter, permission coordinator, and teleport/reload controllers,
/// rendering every step through a [`ChatFrontend`].
pub struct ChatEngine<F: ChatFrontend + TeleportNotifier> {
    sessions: Arc<Mutex<SessionManager>>,
    permissions: Arc<PermissionCoordinator>,
    adapter: Arc<dyn AgentAdapter>,
    teleport: Arc<TeleportController>,
    reload: Arc<ReloadCoordinator>,
    frontend: Arc<F>,
    connections: Mutex<HashMap<String, mpsc::Sender<AgentCommand>>>,
    chat_identity: String,
    default_cwd: String,
    bash_rule_generator: CliBashRuleGenerator,
}

impl<F: ChatFrontend + TeleportNotifier + 'static> ChatEngine<F> {
    /// Takes the same `SessionManager`/`TeleportController`/
    /// `ReloadCoordinator` instances the HTTP surface is wired to, so a
    /// `/teleport` POST and a chat message see the same session state.
    /// `agent_command` is the same binary the agent adapter launches —
    /// the smart Bash rule generator invokes it single-turn and toolless
    /// (§4.3 "Rule synthesis").
    pub fn new(
        sessions: Arc<Mutex<SessionManager>>,
        teleport: Arc<TeleportController>,
        reload: Arc<ReloadCoordinator>,
        adapter: Arc<dyn AgentAdapter>,
        frontend: Arc<F>,
        chat_identity: impl Into<String>,
        default_cwd: impl Into<String>,
        agent_command: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            permissions: Arc::new(PermissionCoordinator::new()),
            adapter,
            teleport,
            reload,
            frontend,
            connections: Mutex::new(HashMap::new()),
            chat_identity: chat_identity.into(),
            default_cwd: default_cwd.into(),
            bash_rule_generator: CliBashRuleGenerator::new(agent_command),
        }
    }

    pub fn reload(&self) -> &ReloadCoordinator {
        &self.reload
    }

    /// Gets or creates this identity's session and, the first time it is
    /// touched, spawns the event pump that mirrors what an SSE consumer
    /// would render. `get_or_create` is itself idempotent, so repeat
    /// calls reuse the same session without re-pumping.
    async fn session(&self) -> Arc<Mutex<Session>> {
        let (session, rx) = {
            let mut manager = self.sessions.lock().await;
            let session = manager.get_or_create(&self.chat_identity, &self.default_cwd);
            let session_id = session.lock().await.id.clone();
            (session, manager.subscribe(&session_id))
        };
        if let Some(rx) = rx {
            tokio::spawn(pump_events(rx, self.frontend.clone()));
        }
        session
    }

    async fn send_command(&self, session_id: &str, cmd: AgentCommand) -> bool {
        let tx = self.connections.lock().await.get(session_id).cloned();
        match tx {
            Some(tx) => tx.send(cmd).await.is_ok(),
            None => false,
        }
    }

    async fn drop_connection(&self, session_id: &str) {
        self.connections.lock().await.remove(session_id);
    }

    /// `/start`: greets and shows the current status.
    pub async fn cmd_start(&self) {
        let session = self.session().await;
        self.render_status(&session).await;
    }

    /// `/new`: drops the agent handle and any pending interaction; the
    /// next message starts a fresh (un-resumed) conversation.
    pub async fn cmd_new(&self) {
        let session = self.session().await;
        let session_id = {
            let mut s = session.lock().await;
            s.agent_session_id = None;
            s.release_agent_handle();
            s.id.clone()
        };
        self.drop_connection(&session_id).await;
        self.frontend.send_text(&session_id, "Started a fresh session.", true).await;
    }

    /// `/cc`: returns the active session to the terminal.
    pub async fn cmd_cc(&self) {
        let session = self.session().await;
        let session_id = session.lock().await.id.clone();
        match self.teleport.return_to_terminal(&session).await {
            Some(_) => {
                self.drop_connection(&session_id).await;
                self.frontend.send_text(&self.chat_identity, "Session returned to the terminal.", true).await;
            }
            None => self.frontend.send_text(&self.chat_identity, "No active terminal session to return.", true).await,
        }
    }

    pub async fn cmd_status(&self) {
        let session = self.session().await;
        self.render_status(&session).await;
    }

    async fn render_status(&self, session: &Arc<Mutex<Session>>) {
        let s = session.lock().await;
        self.frontend
            .update_status(&s.id, s.mode, s.current_model.as_deref(), s.context.percent_used, s.usage.total_cost_usd)
            .await;
    }

    /// `/mode [arg]`: with no argument, the caller shows the mode
    /// keyboard; this sets it directly when `arg` names a valid mode.
    pub async fn cmd_mode(&self, arg: Option<&str>) {
        let session = self.session().await;
        let Some(arg) = arg else {
            let mode = session.lock().await.mode;
            self.frontend.send_text(&self.chat_identity, &format!("Current mode: {}", mode.display_name()), true).await;
            return;
        };
        match mode_from_id(arg) {
            Some(mode) => self.set_mode(&session, mode).await,
            None => self.frontend.send_text(&self.chat_identity, &format!("Unknown mode: {arg}"), true).await,
        }
    }

    async fn set_mode(&self, session: &Arc<Mutex<Session>>, mode: Mode) {
        let (session_id, model, pct, cost) = {
            let mut s = session.lock().await;
            s.mode = mode;
            (s.id.clone(), s.current_model.clone(), s.context.percent_used, s.usage.total_cost_usd)
        };
        self.send_command(&session_id, AgentCommand::SetMode(mode)).await;
        self.frontend.update_status(&session_id, mode, model.as_deref(), pct, cost).await;
    }

    /// `/model [arg]`: with an argument, passes it straight to the agent
    /// adapter's `set_model`.
    pub async fn cmd_model(&self, arg: Option<&str>) {
        let session = self.session().await;
        let Some(arg) = arg else {
            let model = session.lock().await.current_model.clone();
            self.frontend
                .send_text(&self.chat_identity, &format!("Current model: {}", model.as_deref().unwrap_or("default")), true)
                .await;
            return;
        };
        let (session_id, mode, pct, cost) = {
            let mut s = session.lock().await;
            s.current_model = Some(arg.to_string());
            (s.id.clone(), s.mode, s.context.percent_used, s.usage.total_cost_usd)
        };
        self.send_command(&session_id, AgentCommand::SetModel(arg.to_string())).await;
        self.frontend.update_status(&session_id, mode, Some(arg), pct, cost).await;
    }

    pub async fn cmd_cost(&self) {
        let session = self.session().await;
        let s = session.lock().await;
        let text = format!(
            "Total cost: ${:.4}\nLast turn: {}",
            s.usage.total_cost_usd,
            s.usage.last_response_cost.map(|c| format!("${c:.4}")).unwrap_or_else(|| "n/a".to_string())
        );
        drop(s);
        self.frontend.send_text(&self.chat_identity, &text, true).await;
    }

    /// `/context`: shows the last known usage, and if the agent is
    /// connected, also fires a refresh query.
    pub async fn cmd_context(&self) {
        let session = self.session().await;
        let (session_id, text) = {
            let s = session.lock().await;
            (
                s.id.clone(),
                format!("Context: {} / {} tokens ({}%)", s.context.tokens_used, s.context.tokens_max, s.context.percent_used),
            )
        };
        self.send_command(&session_id, AgentCommand::Query("/context".to_string())).await;
        self.frontend.send_text(&self.chat_identity, &text, true).await;
    }

    pub async fn cmd_compact(&self) {
        self.forward_query("/compact").await;
    }

    pub async fn cmd_todos(&self) {
        self.forward_query("/todos").await;
    }

    async fn forward_query(&self, text: &str) {
        let session = self.session().await;
        let session_id = session.lock().await.id.clone();
        if self.send_command(&session_id, AgentCommand::Query(text.to_string())).await {
            session.lock().await.is_processing = true;
        } else {
            self.frontend.send_text(&session_id, "No active agent connection.", true).await;
        }
    }

    /// `/stop`: interrupts the in-flight turn, if any.
    pub async fn cmd_stop(&self) {
        let session = self.session().await;
        let session_id = session.lock().await.id.clone();
        self.send_command(&session_id, AgentCommand::Interrupt).await;
        self.frontend.send_text(&self.chat_identity, "Interrupted.", true).await;
    }

    /// `/cancel`: clears any pending teleport for this identity. Does not
    /// touch an active session.
    pub async fn cmd_cancel(&self) {
        self.teleport.consume(&self.chat_identity).await;
        self.frontend.send_text(&self.chat_identity, "Cancelled.", true).await;
    }

    /// `/link <token>`: the token this identity should resolve a pending
    /// setup-link rendezvous with. The rendezvous registry itself lives
    /// in `teleportd-server::setup_link`; this just extracts the token.
    pub fn cmd_link(&self, arg: Option<&str>) -> Option<String> {
        arg.map(str::to_string)
    }

    /// Ingests a `POST /teleport`-equivalent handoff for this identity.
    pub async fn accept_teleport(&self, request: TeleportRequest) {
        let session = self.session().await;
        self.teleport.teleport(&self.chat_identity, &session, self.frontend.as_ref(), request).await;
    }

    /// Handles a free-text message: consumed as a rejection reason or
    /// custom question answer if one is pending, otherwise forwarded as
    /// a fresh agent query (connecting the agent first if needed).
    pub async fn handle_text(&self, text: &str) {
        let session = self.session().await;

        if let Some(request) = self.teleport.consume(&self.chat_identity).await {
            let session_id = {
                let mut s = session.lock().await;
                s.cwd = request.cwd;
                s.mode = request.permission_mode;
                s.terminal_id = Some(request.terminal_id);
                s.agent_session_id = Some(request.agent_session_id);
                s.id.clone()
            };
            self.drop_connection(&session_id).await;
            self.connect_and_query(&session, text).await;
            return;
        }

        let rejection_tool_id = {
            let mut s = session.lock().await;
            if s.waiting_for_rejection_reason {
                s.waiting_for_rejection_reason = false;
                s.pending_permission.as_ref().map(|p| p.request_id.clone())
            } else {
                None
            }
        };
        if let Some(tool_id) = rejection_tool_id {
            let session_id = session.lock().await.id.clone();
            self.send_command(
                &session_id,
                AgentCommand::ResolvePermission { tool_id, decision: PermissionDecision::Deny { reason: Some(text.to_string()) } },
            )
            .await;
            self.frontend.send_text(&session_id, "Rejected.", false).await;
            return;
        }

        let awaiting_custom = {
            let s = session.lock().await;
            s.pending_question.as_ref().is_some_and(|q| q.awaiting_custom_answer)
        };
        if awaiting_custom {
            self.submit_question_answer(&session, text.to_string()).await;
            return;
        }

        let session_id = session.lock().await.id.clone();
        if self.send_command(&session_id, AgentCommand::Query(text.to_string())).await {
            session.lock().await.is_processing = true;
            return;
        }

        self.connect_and_query(&session, text).await;
    }

    async fn connect_and_query(&self, session: &Arc<Mutex<Session>>, text: &str) {
        let (session_id, cwd, resume, mode) = {
            let s = session.lock().await;
            (s.id.clone(), s.cwd.clone(), s.agent_session_id.clone(), s.mode)
        };
        match self.adapter.connect(&session_id, &cwd, resume.as_deref(), mode).await {
            Ok(conn) => {
                let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
                self.connections.lock().await.insert(session_id.clone(), tx.clone());
                {
                    let mut s = session.lock().await;
                    s.agent_handle = Some(Box::new(ConnectedMarker));
                    s.is_processing = true;
                }
                tokio::spawn(run_agent_task(session.clone(), self.permissions.clone(), self.frontend.clone(), conn, rx));
                let _ = tx.send(AgentCommand::Query(text.to_string())).await;
            }
            Err(err) => {
                warn!(%err, session_id, "failed to connect agent");
                self.frontend.send_text(&session_id, "Could not start the agent.", true).await;
            }
        }
    }

    /// Resolves a permission/question/mode/model callback. The caller is
    /// responsible for acknowledging the callback query to the chat SDK
    /// before awaiting this, per §4.9's "ack before downstream work" rule.
    pub async fn handle_callback(&self, data: &str) {
        let Some(action) = crate::callback::parse(data) else {
            return;
        };
        let session = self.session().await;

        match action {
            CallbackAction::Permission(kind) => self.resolve_permission(&session, kind).await,
            CallbackAction::Question { q_idx, choice } => self.resolve_question(&session, q_idx, choice).await,
            CallbackAction::Mode(id) => {
                if let Some(mode) = mode_from_id(&id) {
                    self.set_mode(&session, mode).await;
                }
            }
            CallbackAction::Model(id) => {
                let (session_id, mode, pct, cost) = {
                    let mut s = session.lock().await;
                    s.current_model = Some(id.clone());
                    (s.id.clone(), s.mode, s.context.percent_used, s.usage.total_cost_usd)
                };
                self.send_command(&session_id, AgentCommand::SetModel(id.clone())).await;
                self.frontend.update_status(&session_id, mode, Some(&id), pct, cost).await;
            }
        }
    }

    async fn resolve_permission(&self, session: &Arc<Mutex<Session>>, kind: PermissionKind) {
        let (session_id, tool_id, tool_name, input, cwd) = {
            let s = session.lock().await;
            let Some(p) = s.pending_permission.as_ref() else {
                return;
            };
            (s.id.clone(), p.request_id.clone(), p.tool_name.clone(), p.input_snapshot.clone(), s.cwd.clone())
        };

        if kind == PermissionKind::Reject {
            session.lock().await.waiting_for_rejection_reason = true;
            self.frontend.send_text(&session_id, "Why? (send a reason)", true).await;
            return;
        }

        if kind == PermissionKind::Always {
            let rule = if tool_name == "Bash" {
                let command = input.get("command").and_then(serde_json::Value::as_str).unwrap_or("");
                generate_smart_bash_rule(&self.bash_rule_generator, command, SMART_BASH_RULE_RETRIES).await
            } else {
                generate_permission_rule(&tool_name, &input)
            };
            if let Err(err) = AllowList::for_cwd(&cwd).add(&rule) {
                warn!(%err, rule, "failed to persist allow-list rule");
            }
        }

        if kind == PermissionKind::AcceptEdits {
            self.set_mode(session, Mode::AcceptEdits).await;
        }

        let decision = kind.as_decision().unwrap_or(PermissionDecision::Allow);
        self.send_command(&session_id, AgentCommand::ResolvePermission { tool_id, decision }).await;
    }

    async fn resolve_question(&self, session: &Arc<Mutex<Session>>, q_idx: usize, choice: QuestionChoice) {
        let answer = {
            let mut s = session.lock().await;
            let Some(pending) = s.pending_question.as_mut() else {
                return;
            };
            if pending.cursor != q_idx {
                return;
            }
            match choice {
                QuestionChoice::Other => {
                    pending.awaiting_custom_answer = true;
                    None
                }
                QuestionChoice::Option(opt_idx) => Some(
                    pending
                        .current_question()
                        .and_then(|q| q.options.get(opt_idx))
                        .cloned()
                        .unwrap_or_default(),
                ),
            }
        };

        match answer {
            None => self.frontend.send_text(&self.chat_identity, "Type your answer:", true).await,
            Some(answer) => self.submit_question_answer(session, answer).await,
        }
    }

    async fn submit_question_answer(&self, session: &Arc<Mutex<Session>>, answer: String) {
        let outcome = {
            let mut s = session.lock().await;
            let Some(pending) = s.pending_question.as_mut() else {
                return;
            };
            let complete = pending.answer(answer);
            if complete {
                let reply = pending.concatenated_reply();
                s.pending_question = None;
                (s.id.clone(), Some(reply), None)
            } else {
                let next_idx = pending.cursor;
                let next = pending.current_question().cloned();
                (s.id.clone(), None, next.map(|q| (next_idx, q)))
            }
        };

        match outcome {
            (session_id, Some(reply), _) => {
                if self.send_command(&session_id, AgentCommand::Query(reply)).await {
                    session.lock().await.is_processing = true;
                }
            }
            (session_id, None, Some((idx, q))) => {
                self.frontend.request_question(&session_id, idx, &q).await;
            }
            _ => {}
        }
    }
}

/// One buffered-but-unsent text chunk, flushed with `is_final = true`
/// right before the turn it belongs to completes (§4.9's "final text of
/// a turn" notification rule — the protocol stream has no other signal
/// for where a turn's last chunk is).
struct PendingText(OrchestratorEvent);

async fn flush_pending_text(pending: &mut Option<PendingText>, session: &Arc<Mutex<Session>>, is_final: bool) {
    let Some(PendingText(event)) = pending.take() else {
        return;
    };
    let event = match event {
        OrchestratorEvent::Text { session_id, content, .. } => OrchestratorEvent::Text { session_id, content, is_final },
        other => other,
    };
    session.lock().await.emit(event);
}

/// Owns one session's `AgentConnection` exclusively for its lifetime:
/// multiplexes chat-originated commands against the agent's own event
/// stream, gates tool calls through the permission coordinator, and
/// updates session usage accounting on each turn's completion.
async fn run_agent_task<F: ChatFrontend>(
    session: Arc<Mutex<Session>>,
    permissions: Arc<PermissionCoordinator>,
    frontend: Arc<F>,
    mut conn: AgentConnection,
    mut cmd_rx: mpsc::Receiver<AgentCommand>,
) {
    let mut pending_text: Option<PendingText> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(AgentCommand::Query(text)) => {
                        let _ = conn.query(&text).await;
                    }
                    Some(AgentCommand::Interrupt) => {
                        let _ = conn.interrupt().await;
                    }
                    Some(AgentCommand::SetMode(mode)) => {
                        let _ = conn.set_mode(mode).await;
                    }
                    Some(AgentCommand::SetModel(model)) => {
                        let _ = conn.set_model(&model).await;
                    }
                    Some(AgentCommand::ResolvePermission { tool_id, decision }) => {
                        let _ = conn.resolve_permission(&tool_id, &decision).await;
                        let mut s = session.lock().await;
                        if let Some(mut pending) = s.pending_permission.take() {
                            let event = OrchestratorEvent::ToolCall {
                                session_id: s.id.clone(),
                                tool_id: pending.request_id.clone(),
                                tool_name: pending.tool_name.clone(),
                                input: pending.input_snapshot.clone(),
                            };
                            pending.resolve(decision);
                            s.emit(event);
                        }
                    }
                    None => break,
                }
            }
            item = conn.next_item() => {
                match item {
                    Some(StreamItem::Event(OrchestratorEvent::ToolCall { session_id, tool_id, tool_name, input })) => {
                        flush_pending_text(&mut pending_text, &session, false).await;
                        let (cwd, mode) = {
                            let s = session.lock().await;
                            (s.cwd.clone(), s.mode)
                        };
                        match permissions.check(mode, &tool_name, &input, &cwd) {
                            AutoDecision::Allow => {
                                session.lock().await.emit(OrchestratorEvent::ToolCall { session_id, tool_id, tool_name, input });
                            }
                            AutoDecision::NeedsApproval => {
                                let (pending, _rx) = PendingPermission::new(tool_id.clone(), tool_name.clone(), input.clone());
                                session.lock().await.pending_permission = Some(pending);
                                let sent = tokio::time::timeout(
                                    PERMISSION_SEND_TIMEOUT,
                                    frontend.request_permission(&session_id, &tool_name, &input),
                                )
                                .await;
                                if sent.is_err() {
                                    warn!(tool_id, "permission prompt send timed out, failing open");
                                    session.lock().await.pending_permission = None;
                                    let _ = conn.resolve_permission(&tool_id, &PermissionDecision::Allow).await;
                                }
                            }
                        }
                    }
                    Some(StreamItem::Event(event @ OrchestratorEvent::Text { .. })) => {
                        flush_pending_text(&mut pending_text, &session, false).await;
                        pending_text = Some(PendingText(event));
                    }
                    Some(StreamItem::Event(event)) => {
                        flush_pending_text(&mut pending_text, &session, false).await;
                        session.lock().await.emit(event);
                    }
                    Some(StreamItem::TurnComplete(marker)) => {
                        flush_pending_text(&mut pending_text, &session, true).await;
                        let mut s = session.lock().await;
                        s.is_processing = false;
                        s.usage.total_cost_usd += marker.total_cost_usd;
                        s.usage.total_input_tokens += marker.usage.input_tokens;
                        s.usage.total_output_tokens += marker.usage.output_tokens;
                        s.usage.num_turns = marker.num_turns;
                        s.usage.last_response_cost = Some(marker.total_cost_usd);
                        s.usage.last_response_tokens = Some(marker.usage.input_tokens + marker.usage.output_tokens);
                        if let Some(id) = marker.session_id {
                            s.agent_session_id = Some(id);
                        }
                        let (id, mode, model, pct, cost) = (s.id.clone(), s.mode, s.current_model.clone(), s.context.percent_used, s.usage.total_cost_usd);
                        drop(s);
                        frontend.update_status(&id, mode, model.as_deref(), pct, cost).await;
                    }
                    None => {
                        flush_pending_text(&mut pending_text, &session, true).await;
                        session.lock().await.release_agent_handle();
                        break;
                    }
                }
            }
        }
    }
}

/// Pumps one session's event bus into frontend render calls, matching
/// what an SSE consumer would see (§4.5), until the bus closes or emits a
/// consumer-closing event.
async fn pump_events<F: ChatFrontend>(mut rx: teleportd_core::EventReceiver, frontend: Arc<F>) {
    while let Some(event) = rx.recv().await {
        let closes = event.closes_consumer();
        render_event(frontend.as_ref(), event).await;
        if closes {
            break;
        }
    }
}

async fn render_event<F: ChatFrontend>(frontend: &F, event: OrchestratorEvent) {
    match event {
        OrchestratorEvent::Text { session_id, content, is_final } => {
            frontend.send_text(&session_id, &content, is_final).await;
        }
        OrchestratorEvent::ToolCall { session_id, tool_id, tool_name, input } => {
            frontend.send_tool_call(&session_id, &tool_id, &tool_name, &input).await;
        }
        OrchestratorEvent::ToolResult { session_id, tool_id, content, is_error } => {
            frontend.send_tool_result(&session_id, &tool_id, &content, is_error, None).await;
        }
        OrchestratorEvent::Question { session_id, question_id: _, questions } => {
            if let Some(q) = questions.first() {
                frontend.request_question(&session_id, 0, q).await;
            }
        }
        OrchestratorEvent::Error { session_id, message } => {
            frontend.send_text(&session_id, &format!("\u{26A0}\u{FE0F} {message}"), true).await;
        }
        OrchestratorEvent::User { .. }
        | OrchestratorEvent::SessionStart { .. }
        | OrchestratorEvent::SessionEnd { .. }
        | OrchestratorEvent::ReturnToTerminal { .. }
        | OrchestratorEvent::Superseded { .. } => {}
    }
}
