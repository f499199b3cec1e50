// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teleportd_core::{Mode, OrchestratorEvent, Session};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

const NOTIFY_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload of `POST /teleport` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleportRequest {
    pub agent_session_id: String,
    pub cwd: String,
    pub terminal_id: String,
    pub permission_mode: Mode,
}

/// Sends a fire-and-forget chat notification. Implemented by the chat
/// frontend; kept abstract here so this crate has no chat-SDK dependency.
#[async_trait]
pub trait TeleportNotifier: Send + Sync {
    async fn notify_teleport(&self, chat_identity: &str, cwd: &str);
}

/// Handles the `/teleport` ingress and its `/cc` inverse: one pending
/// handoff per chat identity, most-recent-wins, consumed by the next chat
/// message from that identity.
pub struct TeleportController {
    pending: Mutex<HashMap<String, TeleportRequest>>,
}

impl TeleportController {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a teleport request for `chat_identity`, overwriting any
    /// earlier pending one (most-recent-wins), updates the session's
    /// `terminal_id` (marking any earlier SSE consumer superseded), and
    /// fires a best-effort chat notification with a 10s send cap.
    pub async fn teleport(
        &self,
        chat_identity: &str,
        session: &Arc<Mutex<Session>>,
        notifier: &dyn TeleportNotifier,
        request: TeleportRequest,
    ) {
        {
            let mut pending = self.pending.lock().await;
            pending.insert(chat_identity.to_string(), request.clone());
        }

        {
            let mut s = session.lock().await;
            s.terminal_id = Some(request.terminal_id.clone());
            s.emit(OrchestratorEvent::superseded(s.id.clone()));
        }

        let cwd = request.cwd.clone();
        let chat_identity = chat_identity.to_string();
        if timeout(NOTIFY_SEND_TIMEOUT, notifier.notify_teleport(&chat_identity, &cwd))
            .await
            .is_err()
        {
            warn!(chat_identity, "teleport notification timed out");
        }
    }

    /// Consumes the pending teleport for `chat_identity`, if any. The
    /// caller is responsible for updating the session and (re)connecting
    /// the agent adapter with the carried `agent_session_id` as the
    /// resume candidate.
    pub async fn consume(&self, chat_identity: &str) -> Option<TeleportRequest> {
        self.pending.lock().await.remove(chat_identity)
    }

    /// `/cc` inverse: enqueues a `return_to_terminal` event carrying the
    /// session's current agent-side conversation id, then releases the
    /// agent handle without awaiting any async disconnect — dropping the
    /// reference lets the adapter finalize on its own so a concurrent
    /// permission callback never races a blocking teardown.
    pub async fn return_to_terminal(&self, session: &Arc<Mutex<Session>>) -> Option<String> {
        let mut s = session.lock().await;
        let agent_session_id = s.agent_session_id.clone()?;
        s.emit(OrchestratorEvent::ReturnToTerminal {
            session_id: s.id.clone(),
            agent_session_id: agent_session_id.clone(),
        });
        s.release_agent_handle();
        Some(agent_session_id)
    }
}

impl Default for TeleportController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use teleportd_core::EventBus;

    struct CountingNotifier(AtomicUsize);

    #[async_trait]
    impl TeleportNotifier for CountingNotifier {
        async fn notify_teleport(&self, _chat_identity: &str, _cwd: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request() -> TeleportRequest {
        TeleportRequest {
            agent_session_id: "agent-1".into(),
            cwd: "/tmp/proj".into(),
            terminal_id: "term-b".into(),
            permission_mode: Mode::Default,
        }
    }

    #[tokio::test]
    async fn teleport_overwrites_pending_for_same_identity() {
        let controller = TeleportController::new();
        let bus = EventBus::new(8);
        let session = Arc::new(Mutex::new(Session::new("s1", "/tmp", bus.sender())));
        let notifier = CountingNotifier(AtomicUsize::new(0));

        controller
            .teleport("user1", &session, &notifier, request())
            .await;
        let mut second = request();
        second.terminal_id = "term-c".into();
        controller
            .teleport("user1", &session, &notifier, second)
            .await;

        let consumed = controller.consume("user1").await.unwrap();
        assert_eq!(consumed.terminal_id, "term-c");
        assert_eq!(notifier.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn consume_is_one_shot() {
        let controller = TeleportController::new();
        let bus = EventBus::new(8);
        let session = Arc::new(Mutex::new(Session::new("s1", "/tmp", bus.sender())));
        let notifier = CountingNotifier(AtomicUsize::new(0));
        controller
            .teleport("user1", &session, &notifier, request())
            .await;
        assert!(controller.consume("user1").await.is_some());
        assert!(controller.consume("user1").await.is_none());
    }

    #[tokio::test]
    async fn teleport_updates_session_terminal_id() {
        let controller = TeleportController::new();
        let bus = EventBus::new(8);
        let session = Arc::new(Mutex::new(Session::new("s1", "/tmp", bus.sender())));
        let notifier = CountingNotifier(AtomicUsize::new(0));
        controller
            .teleport("user1", &session, &notifier, request())
            .await;
        assert_eq!(session.lock().await.terminal_id.as_deref(), Some("term-b"));
    }

    #[tokio::test]
    async fn return_to_terminal_releases_handle_and_emits_event() {
        let controller = TeleportController::new();
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let session = Arc::new(Mutex::new(Session::new("s1", "/tmp", bus.sender())));
        session.lock().await.agent_session_id = Some("agent-7".to_string());

        let returned = controller.return_to_terminal(&session).await;
        assert_eq!(returned.as_deref(), Some("agent-7"));
        assert!(session.lock().await.agent_handle.is_none());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, OrchestratorEvent::ReturnToTerminal { .. }));
    }

    #[tokio::test]
    async fn return_to_terminal_without_agent_session_is_none() {
        let controller = TeleportController::new();
        let bus = EventBus::new(8);
        let session = Arc::new(Mutex::new(Session::new("s1", "/tmp", bus.sender())));
        assert!(controller.return_to_terminal(&session).await.is_none());
    }
}
