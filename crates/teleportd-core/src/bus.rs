// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tokio::sync::broadcast;
use tracing::warn;

use crate::events::OrchestratorEvent;

/// Bound of the per-session broadcast channel. Past this many undelivered
/// events a lagging consumer drops the oldest and is told so (§4.5).
const CHANNEL_CAPACITY: usize = 256;

/// Per-session fan-out: one producer (the session's own event loop), zero
/// or more consumers (SSE streams). Built on a broadcast channel so a slow
/// consumer never blocks the producer or other consumers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

/// Producer handle, held by a [`crate::Session`].
#[derive(Clone)]
pub struct EventSender {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventSender {
    /// Publishes an event. A channel with no subscribers silently drops it
    /// — nobody is listening, which is not an error.
    pub fn emit(&self, event: OrchestratorEvent) {
        let _ = self.tx.send(event);
    }
}

/// Consumer handle, held by one SSE stream task.
pub struct EventReceiver {
    rx: broadcast::Receiver<OrchestratorEvent>,
}

impl EventReceiver {
    /// Awaits the next event. On `Lagged`, the skipped count is reported
    /// as a synthetic error event rather than surfaced as a hard error —
    /// the consumer is marked lossy but kept alive.
    pub async fn recv(&mut self) -> Option<OrchestratorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event consumer lagged, synthesizing error event");
                    return Some(OrchestratorEvent::lagged("", skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new(4);
        let sender = bus.sender();
        let mut rx = bus.subscribe();
        sender.emit(OrchestratorEvent::SessionStart {
            session_id: "s1".into(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.session_id(), "s1");
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        let sender = bus.sender();
        sender.emit(OrchestratorEvent::SessionStart {
            session_id: "s1".into(),
        });
    }

    #[tokio::test]
    async fn overflow_surfaces_as_synthetic_error_event() {
        let bus = EventBus::new(2);
        let sender = bus.sender();
        let mut rx = bus.subscribe();
        for i in 0..5 {
            sender.emit(OrchestratorEvent::Text {
                session_id: "s1".into(),
                content: format!("msg{i}"),
                is_final: false,
            });
        }
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, OrchestratorEvent::Error { .. }));
    }

    #[tokio::test]
    async fn closed_bus_returns_none() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(rx.recv().await.is_none());
    }
}
