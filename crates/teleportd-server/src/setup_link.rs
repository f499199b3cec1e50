// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Setup-link rendezvous: pairs a freshly-generated token shown on a
//! terminal with the chat identity that redeems it via `/link <token>`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::timeout;

const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Identity resolved from the chat-side `/link` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub user_id: String,
    pub display_name: String,
}

struct Slot {
    tx: Option<oneshot::Sender<LinkedIdentity>>,
    rx: Option<oneshot::Receiver<LinkedIdentity>>,
}

/// Registry of outstanding setup-link tokens, keyed case-insensitively.
#[derive(Default)]
pub struct SetupLinkRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

impl SetupLinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(token: &str) -> String {
        token.trim().to_uppercase()
    }

    /// Registers `token` for pairing, discarding any earlier unconsumed
    /// registration. Does not itself hand back the receiver — call
    /// [`take_receiver`](Self::take_receiver) to start waiting on it.
    pub fn register(&self, token: &str) {
        let key = Self::normalize(token);
        let (tx, rx) = oneshot::channel();
        self.slots.lock().unwrap().insert(
            key,
            Slot {
                tx: Some(tx),
                rx: Some(rx),
            },
        );
    }

    /// Takes the receiver for `token`'s single waiter. Returns `None` if the
    /// token was never registered or its receiver was already taken by an
    /// earlier long-poll.
    pub fn take_receiver(&self, token: &str) -> Option<oneshot::Receiver<LinkedIdentity>> {
        let key = Self::normalize(token);
        self.slots.lock().unwrap().get_mut(&key)?.rx.take()
    }

    /// Resolves `token` with `identity`. A token that isn't registered, or
    /// whose sender was already consumed, is a silent no-op — the caller
    /// cannot distinguish "already resolved" from "never existed".
    pub fn resolve(&self, token: &str, identity: LinkedIdentity) {
        let key = Self::normalize(token);
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&key) {
            if let Some(tx) = slot.tx.take() {
                let _ = tx.send(identity);
            }
        }
    }

    /// `true` if `token` is registered and its receiver has not yet been
    /// taken by a long-poll.
    pub fn is_pending(&self, token: &str) -> bool {
        let key = Self::normalize(token);
        self.slots
            .lock()
            .unwrap()
            .get(&key)
            .map(|s| s.rx.is_some())
            .unwrap_or(false)
    }

    pub fn forget(&self, token: &str) {
        let key = Self::normalize(token);
        self.slots.lock().unwrap().remove(&key);
    }
}

/// Long-polls up to 300s for `token`'s resolution. `None` means the
/// deadline elapsed or the registration was dropped without resolving.
pub async fn wait_for_link(rx: oneshot::Receiver<LinkedIdentity>) -> Option<LinkedIdentity> {
    timeout(WAIT_TIMEOUT, rx).await.ok().and_then(Result::ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> LinkedIdentity {
        LinkedIdentity {
            user_id: "u1".into(),
            display_name: "Ada".into(),
        }
    }

    #[test]
    fn token_lookup_is_case_insensitive() {
        let registry = SetupLinkRegistry::new();
        registry.register("abCD12");
        assert!(registry.is_pending("ABCD12"));
        assert!(registry.is_pending("abcd12"));
    }

    #[tokio::test]
    async fn resolve_completes_the_waiter() {
        let registry = SetupLinkRegistry::new();
        registry.register("tok1");
        let rx = registry.take_receiver("tok1").unwrap();
        registry.resolve("TOK1", identity());
        let resolved = wait_for_link(rx).await.unwrap();
        assert_eq!(resolved.user_id, "u1");
    }

    #[test]
    fn resolve_of_unregistered_token_is_a_silent_no_op() {
        let registry = SetupLinkRegistry::new();
        registry.resolve("ghost", identity());
    }

    #[tokio::test]
    async fn second_resolution_is_a_no_op() {
        let registry = SetupLinkRegistry::new();
        registry.register("tok1");
        let rx = registry.take_receiver("tok1").unwrap();
        registry.resolve("tok1", identity());
        let mut other = identity();
        other.user_id = "u2".into();
        registry.resolve("tok1", other); // no-op, already consumed
        let resolved = wait_for_link(rx).await.unwrap();
        assert_eq!(resolved.user_id, "u1");
    }

    #[test]
    fn is_pending_false_after_forget() {
        let registry = SetupLinkRegistry::new();
        registry.register("tok1");
        registry.forget("tok1");
        assert!(!registry.is_pending("tok1"));
    }

    #[test]
    fn take_receiver_is_one_shot() {
        let registry = SetupLinkRegistry::new();
        registry.register("tok1");
        assert!(registry.take_receiver("tok1").is_some());
        assert!(registry.take_receiver("tok1").is_none());
    }
}
