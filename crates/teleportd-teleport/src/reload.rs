// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Notified of reload state transitions. Implemented by the chat frontend.
#[async_trait]
pub trait ReloadNotifier: Send + Sync {
    async fn notify_reload_pending(&self);
    async fn notify_reloading(&self);
}

/// Response shape of `GET /api/can-reload` (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanReload {
    pub can_reload: bool,
    pub force_reload: bool,
    pub reload_pending: bool,
    pub sessions: usize,
    pub processing: usize,
}

/// Coordinates the hot-reload handshake: a reload is safe once no session
/// is mid-turn, or once an operator has forced it.
#[derive(Default)]
pub struct ReloadCoordinator {
    reload_pending: AtomicBool,
    force_reload: AtomicBool,
}

impl ReloadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, sessions: usize, processing: usize) -> CanReload {
        let force_reload = self.force_reload.load(Ordering::SeqCst);
        CanReload {
            can_reload: force_reload || processing == 0,
            force_reload,
            reload_pending: self.reload_pending.load(Ordering::SeqCst),
            sessions,
            processing,
        }
    }

    /// Marks a reload as requested and notifies the chat frontend.
    pub async fn request_reload(&self, notifier: &dyn ReloadNotifier) {
        self.reload_pending.store(true, Ordering::SeqCst);
        notifier.notify_reload_pending().await;
    }

    /// Forces the next `can_reload` check to succeed regardless of any
    /// session still processing.
    pub fn force_reload(&self) {
        self.force_reload.store(true, Ordering::SeqCst);
    }

    /// Clears both flags and notifies the chat frontend that the reload is
    /// imminent. The caller is responsible for disconnecting agent handles
    /// and calling `SessionManager::save_state` afterward.
    pub async fn prepare_reload(&self, notifier: &dyn ReloadNotifier) {
        self.reload_pending.store(false, Ordering::SeqCst);
        self.force_reload.store(false, Ordering::SeqCst);
        notifier.notify_reloading().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingNotifier {
        pending: AtomicUsize,
        reloading: AtomicUsize,
    }

    #[async_trait]
    impl ReloadNotifier for CountingNotifier {
        async fn notify_reload_pending(&self) {
            self.pending.fetch_add(1, Ordering::SeqCst);
        }
        async fn notify_reloading(&self) {
            self.reloading.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn can_reload_is_false_while_any_session_is_processing() {
        let c = ReloadCoordinator::new();
        assert!(!c.status(2, 1).can_reload);
        assert!(c.status(2, 0).can_reload);
    }

    #[test]
    fn force_reload_overrides_processing_sessions() {
        let c = ReloadCoordinator::new();
        c.force_reload();
        assert!(c.status(3, 3).can_reload);
    }

    #[tokio::test]
    async fn request_reload_sets_pending_and_notifies() {
        let c = ReloadCoordinator::new();
        let notifier = CountingNotifier::default();
        c.request_reload(&notifier).await;
        assert!(c.status(0, 0).reload_pending);
        assert_eq!(notifier.pending.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn prepare_reload_clears_flags_and_notifies() {
        let c = ReloadCoordinator::new();
        let notifier = CountingNotifier::default();
        c.request_reload(&notifier).await;
        c.force_reload();
        c.prepare_reload(&notifier).await;
        let status = c.status(0, 0);
        assert!(!status.reload_pending);
        assert!(!status.force_reload);
        assert_eq!(notifier.reloading.load(Ordering::SeqCst), 1);
    }
}
