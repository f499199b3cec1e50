// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use teleportd_core::{EventBus, EventReceiver, Mode, Session};
use tokio::sync::Mutex;
use tracing::{info, warn};

const EVENT_BUS_CAPACITY: usize = 256;

struct Entry {
    session: Arc<Mutex<Session>>,
    bus: EventBus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotEntry {
    session_id: String,
    agent_session_id: Option<String>,
    terminal_id: Option<String>,
    cwd: String,
    mode: Mode,
}

/// Owns the mapping from chat identity to session and from session id to
/// session (§4.1).
pub struct SessionManager {
    sessions: HashMap<String, Entry>,
    chat_to_session: HashMap<String, String>,
    snapshot_path: PathBuf,
}

impl SessionManager {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self {
            sessions: HashMap::new(),
            chat_to_session: HashMap::new(),
            snapshot_path,
        }
    }

    /// Idempotent: returns the existing session for this chat identity, or
    /// creates one with default mode and the given process cwd.
    pub fn get_or_create(&mut self, chat_identity: &str, default_cwd: &str) -> Arc<Mutex<Session>> {
        if let Some(session_id) = self.chat_to_session.get(chat_identity) {
            if let Some(entry) = self.sessions.get(session_id) {
                return entry.session.clone();
            }
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let bus = EventBus::new(EVENT_BUS_CAPACITY);
        let session = Arc::new(Mutex::new(Session::new(
            session_id.clone(),
            default_cwd,
            bus.sender(),
        )));
        self.sessions.insert(
            session_id.clone(),
            Entry {
                session: session.clone(),
                bus,
            },
        );
        self.chat_to_session
            .insert(chat_identity.to_string(), session_id);
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(session_id).map(|e| e.session.clone())
    }

    pub fn get_by_chat_identity(&self, chat_identity: &str) -> Option<Arc<Mutex<Session>>> {
        let session_id = self.chat_to_session.get(chat_identity)?;
        self.get(session_id)
    }

    /// New subscriber to a session's event bus, for an SSE stream.
    pub fn subscribe(&self, session_id: &str) -> Option<EventReceiver> {
        self.sessions.get(session_id).map(|e| e.bus.subscribe())
    }

    pub fn all_sessions(&self) -> Vec<Arc<Mutex<Session>>> {
        self.sessions.values().map(|e| e.session.clone()).collect()
    }

    /// The id of the session currently bound to `terminal_id`, if any.
    pub async fn session_id_for_terminal(&self, terminal_id: &str) -> Option<String> {
        for entry in self.sessions.values() {
            let session = entry.session.lock().await;
            if session.terminal_id.as_deref() == Some(terminal_id) {
                return Some(session.id.clone());
            }
        }
        None
    }

    /// `(total sessions, sessions currently mid-turn)`.
    pub async fn processing_counts(&self) -> (usize, usize) {
        let mut processing = 0;
        for entry in self.sessions.values() {
            if entry.session.lock().await.is_processing {
                processing += 1;
            }
        }
        (self.sessions.len(), processing)
    }

    /// Drops every session's agent handle ahead of a reload quiesce.
    pub async fn release_all_agent_handles(&self) {
        for entry in self.sessions.values() {
            entry.session.lock().await.release_agent_handle();
        }
    }

    /// Releases the agent handle (no async disconnect call — see
    /// `Session::release_agent_handle`) and removes the chat binding. The
    /// handle is dropped synchronously; any leak is merely logged.
    pub async fn clear(&mut self, chat_identity: &str) {
        let Some(session_id) = self.chat_to_session.remove(chat_identity) else {
            return;
        };
        if let Some(entry) = self.sessions.remove(&session_id) {
            let mut session = entry.session.lock().await;
            if session.agent_handle.is_some() {
                warn!(session_id, "dropping live agent handle on clear");
            }
            session.release_agent_handle();
        }
    }

    /// Writes `{chat_identity -> {session_id, agent_session_id,
    /// terminal_id, cwd, mode}}` to the snapshot path. Sessions with no
    /// agent-issued id yet are skipped — there is nothing to resume.
    pub async fn save_state(&self) {
        let mut state = HashMap::new();
        for (chat_identity, session_id) in &self.chat_to_session {
            let Some(entry) = self.sessions.get(session_id) else {
                continue;
            };
            let session = entry.session.lock().await;
            if session.agent_session_id.is_none() {
                continue;
            }
            state.insert(
                chat_identity.clone(),
                SnapshotEntry {
                    session_id: session.id.clone(),
                    agent_session_id: session.agent_session_id.clone(),
                    terminal_id: session.terminal_id.clone(),
                    cwd: session.cwd.clone(),
                    mode: session.mode,
                },
            );
        }

        if state.is_empty() {
            let _ = std::fs::remove_file(&self.snapshot_path);
            return;
        }
        match serde_json::to_string(&state) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&self.snapshot_path, json) {
                    warn!(%err, "failed to write session snapshot");
                }
            }
            Err(err) => warn!(%err, "failed to serialize session snapshot"),
        }
    }

    /// Restores sessions from the snapshot. Decode errors are silent —
    /// an absent or corrupt snapshot just means a fresh start.
    pub fn load_state(&mut self) {
        let Ok(text) = std::fs::read_to_string(&self.snapshot_path) else {
            return;
        };
        let Ok(state) = serde_json::from_str::<HashMap<String, SnapshotEntry>>(&text) else {
            warn!("session snapshot is corrupt, starting fresh");
            return;
        };

        for (chat_identity, snap) in state {
            let bus = EventBus::new(EVENT_BUS_CAPACITY);
            let mut session = Session::new(snap.session_id.clone(), snap.cwd, bus.sender());
            session.agent_session_id = snap.agent_session_id;
            session.terminal_id = snap.terminal_id;
            session.mode = snap.mode;
            let session_id = session.id.clone();
            self.sessions.insert(
                session_id.clone(),
                Entry {
                    session: Arc::new(Mutex::new(session)),
                    bus,
                },
            );
            self.chat_to_session.insert(chat_identity, session_id);
        }
        info!(count = self.sessions.len(), "restored sessions from snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        (dir, SessionManager::new(path))
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_chat_identity() {
        let (_dir, mut mgr) = manager();
        let a = mgr.get_or_create("user1", "/tmp");
        let b = mgr.get_or_create("user1", "/tmp");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn distinct_identities_get_distinct_sessions() {
        let (_dir, mut mgr) = manager();
        let a = mgr.get_or_create("user1", "/tmp");
        let b = mgr.get_or_create("user2", "/tmp");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn clear_removes_binding_and_releases_handle() {
        let (_dir, mut mgr) = manager();
        let session = mgr.get_or_create("user1", "/tmp");
        {
            let mut s = session.lock().await;
            s.is_processing = true;
        }
        mgr.clear("user1").await;
        assert!(mgr.get_by_chat_identity("user1").is_none());
    }

    #[tokio::test]
    async fn save_state_skips_sessions_without_agent_session_id() {
        let (_dir, mut mgr) = manager();
        mgr.get_or_create("user1", "/tmp");
        mgr.save_state().await;
        assert!(!mgr.snapshot_path.exists());
    }

    #[tokio::test]
    async fn save_and_load_state_round_trips_resumable_sessions() {
        let (_dir, mut mgr) = manager();
        let session = mgr.get_or_create("user1", "/tmp/project");
        {
            let mut s = session.lock().await;
            s.agent_session_id = Some("agent-conv-1".to_string());
            s.terminal_id = Some("term-a".to_string());
        }
        mgr.save_state().await;

        let mut restored = SessionManager::new(mgr.snapshot_path.clone());
        restored.load_state();
        let restored_session = restored.get_by_chat_identity("user1").unwrap();
        let s = restored_session.lock().await;
        assert_eq!(s.agent_session_id.as_deref(), Some("agent-conv-1"));
        assert_eq!(s.cwd, "/tmp/project");
    }

    #[tokio::test]
    async fn subscribe_to_unknown_session_is_none() {
        let (_dir, mgr) = manager();
        assert!(mgr.subscribe("does-not-exist").is_none());
    }

    #[tokio::test]
    async fn session_id_for_terminal_finds_the_bound_session() {
        let (_dir, mut mgr) = manager();
        let session = mgr.get_or_create("user1", "/tmp");
        let session_id = session.lock().await.id.clone();
        session.lock().await.terminal_id = Some("term-a".to_string());
        assert_eq!(
            mgr.session_id_for_terminal("term-a").await,
            Some(session_id)
        );
        assert_eq!(mgr.session_id_for_terminal("term-b").await, None);
    }

    #[tokio::test]
    async fn processing_counts_reflects_live_sessions() {
        let (_dir, mut mgr) = manager();
        let a = mgr.get_or_create("user1", "/tmp");
        let b = mgr.get_or_create("user2", "/tmp");
        a.lock().await.is_processing = true;
        let _ = &b;
        assert_eq!(mgr.processing_counts().await, (2, 1));
    }

    #[tokio::test]
    async fn release_all_agent_handles_clears_every_session() {
        let (_dir, mut mgr) = manager();
        let session = mgr.get_or_create("user1", "/tmp");
        session.lock().await.is_processing = true;
        mgr.release_all_agent_handles().await;
        assert!(session.lock().await.is_idle());
    }
}
