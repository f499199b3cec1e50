// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! SSE event framing, global connection tracking, and the wrapper-managed
//! self-shutdown condition.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use teleportd_core::{EventReceiver, OrchestratorEvent};

/// Environment variable set by a wrapper process that owns the orchestrator's
/// lifecycle; its presence permits self-initiated shutdown on idle.
pub const WRAPPER_MANAGED_ENV: &str = "TELEPORTD_WRAPPER_MANAGED";

pub fn is_wrapper_managed() -> bool {
    std::env::var(WRAPPER_MANAGED_ENV).is_ok()
}

/// `true` once every condition for self-shutdown holds: no open SSE
/// connections, no session holding a live agent handle, and a wrapper owns
/// the process lifecycle.
pub fn should_self_shutdown(open_connections: usize, live_agent_handles: usize) -> bool {
    open_connections == 0 && live_agent_handles == 0 && is_wrapper_managed()
}

/// Tracks the number of open `/stream` connections across the whole server.
#[derive(Default)]
pub struct ConnectionTracker {
    count: AtomicUsize,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// RAII guard: decrements the tracker's count when the SSE stream it guards
/// is dropped, whether by normal completion or client disconnect.
pub struct ConnectionGuard {
    tracker: Arc<ConnectionTracker>,
}

impl ConnectionGuard {
    pub fn new(tracker: Arc<ConnectionTracker>) -> Self {
        tracker.count.fetch_add(1, Ordering::SeqCst);
        Self { tracker }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Translates an [`OrchestratorEvent`] into an SSE `event: <name>` /
/// `data: <json>` pair, named after the event's serde tag.
fn to_sse_event(event: &OrchestratorEvent) -> Event {
    let value = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
    let name = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("event")
        .to_string();
    Event::default()
        .event(name)
        .json_data(&value)
        .unwrap_or_else(|_| Event::default().event("error").data("serialization failed"))
}

/// Wraps an [`EventReceiver`] into a stream of SSE frames, interleaving a
/// `keepalive` frame every time `keepalive` elapses without a real event.
/// The stream ends after delivering an event for which
/// [`OrchestratorEvent::closes_consumer`] is true.
pub fn session_event_stream(
    rx: EventReceiver,
    keepalive: Duration,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    futures::stream::unfold((rx, false), move |(mut rx, done)| async move {
        if done {
            return None;
        }
        tokio::select! {
            event = rx.recv() => {
                let event = event?;
                let closes = event.closes_consumer();
                Some((Ok(to_sse_event(&event)), (rx, closes)))
            }
            _ = tokio::time::sleep(keepalive) => {
                let frame = Event::default().event("keepalive").data("{}");
                Some((Ok(frame), (rx, false)))
            }
        }
    })
}

/// Pairs a stream with a [`ConnectionGuard`] so the guard's `Drop` (and the
/// count decrement it performs) fires exactly when the stream itself is
/// dropped, whether that's normal completion or an aborted client request.
pub struct GuardedStream<S> {
    inner: Pin<Box<S>>,
    _guard: ConnectionGuard,
}

impl<S> GuardedStream<S> {
    pub fn new(inner: S, guard: ConnectionGuard) -> Self {
        Self {
            inner: Box::pin(inner),
            _guard: guard,
        }
    }
}

impl<S: Stream> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleportd_core::EventBus;
    use tokio_stream::StreamExt;

    #[test]
    fn connection_guard_increments_and_decrements() {
        let tracker = Arc::new(ConnectionTracker::new());
        {
            let _guard = ConnectionGuard::new(tracker.clone());
            assert_eq!(tracker.count(), 1);
        }
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn should_self_shutdown_requires_every_condition() {
        std::env::remove_var(WRAPPER_MANAGED_ENV);
        assert!(!should_self_shutdown(0, 0));
        std::env::set_var(WRAPPER_MANAGED_ENV, "1");
        assert!(should_self_shutdown(0, 0));
        assert!(!should_self_shutdown(1, 0));
        assert!(!should_self_shutdown(0, 1));
        std::env::remove_var(WRAPPER_MANAGED_ENV);
    }

    #[tokio::test]
    async fn stream_emits_events_and_stops_after_superseded() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        let sender = bus.sender();
        sender.emit(OrchestratorEvent::SessionStart {
            session_id: "s1".into(),
        });
        sender.emit(OrchestratorEvent::superseded("s1"));

        let mut stream = Box::pin(session_event_stream(rx, Duration::from_secs(30)));
        let first = stream.next().await.unwrap().unwrap();
        assert!(format!("{first:?}").contains("session_start"));
        let second = stream.next().await.unwrap().unwrap();
        assert!(format!("{second:?}").contains("superseded"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn stream_emits_keepalive_when_idle() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe();
        let mut stream = Box::pin(session_event_stream(rx, Duration::from_millis(10)));
        let first = stream.next().await.unwrap().unwrap();
        assert!(format!("{first:?}").contains("keepalive"));
    }
}
