// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Route handlers: teleport ingress, health, the SSE stream, reload
//! handshake, and setup-link rendezvous.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use teleportd_teleport::TeleportRequest;
use tracing::info;

use crate::app::AppState;
use crate::setup_link::wait_for_link;
use crate::sse::{session_event_stream, ConnectionGuard, GuardedStream};

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn not_found(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /teleport` — §4.6 handoff ingress. The caller supplies the chat
/// identity the handoff is for via `X-Chat-Identity`; a production wrapper
/// sets this from its own authenticated session, not from request content.
pub async fn teleport(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(request): Json<TeleportRequest>,
) -> impl IntoResponse {
    let Some(chat_identity) = headers
        .get("x-chat-identity")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "missing X-Chat-Identity header".into(),
            }),
        )
            .into_response();
    };

    let session = {
        let mut manager = state.sessions.lock().await;
        manager.get_or_create(&chat_identity, &request.cwd)
    };

    state
        .teleport
        .teleport(
            &chat_identity,
            &session,
            state.teleport_notifier.as_ref(),
            request,
        )
        .await;

    Json(serde_json::json!({ "accepted": true })).into_response()
}

#[derive(Deserialize)]
pub struct StreamQuery {
    pub terminal_id: String,
}

/// `GET /stream?terminal_id=…` — SSE of the session currently bound to
/// `terminal_id`.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let rx = {
        let manager = state.sessions.lock().await;
        let Some(session_id) = manager.session_id_for_terminal(&query.terminal_id).await else {
            return not_found("no session bound to this terminal_id").into_response();
        };
        manager.subscribe(&session_id)
    };
    let Some(rx) = rx else {
        return not_found("session has no active event bus").into_response();
    };

    info!(terminal_id = %short(&query.terminal_id), "SSE stream opened");
    let guard = ConnectionGuard::new(state.connections.clone());
    let stream = session_event_stream(rx, Duration::from_secs(state.sse_keepalive_secs));
    Sse::new(GuardedStream::new(stream, guard)).into_response()
}

fn short(id: &str) -> String {
    id.chars().take(8).collect()
}

pub async fn can_reload(State(state): State<AppState>) -> impl IntoResponse {
    let (sessions, processing) = {
        let manager = state.sessions.lock().await;
        manager.processing_counts().await
    };
    let status = state.reload.status(sessions, processing);
    Json(serde_json::json!({
        "can_reload": status.can_reload,
        "force_reload": status.force_reload,
        "reload_pending": status.reload_pending,
        "sessions": status.sessions,
        "processing": status.processing,
    }))
}

pub async fn request_reload(State(state): State<AppState>) -> impl IntoResponse {
    state
        .reload
        .request_reload(state.reload_notifier.as_ref())
        .await;
    Json(serde_json::json!({ "reload_pending": true }))
}

pub async fn force_reload(State(state): State<AppState>) -> impl IntoResponse {
    state.reload.force_reload();
    Json(serde_json::json!({ "force_reload": true }))
}

/// `POST /api/prepare-reload` — disconnects every agent handle and
/// persists session metadata so the respawned process can rebind.
pub async fn prepare_reload(State(state): State<AppState>) -> impl IntoResponse {
    state
        .reload
        .prepare_reload(state.reload_notifier.as_ref())
        .await;
    {
        let mut manager = state.sessions.lock().await;
        manager.release_all_agent_handles().await;
        manager.save_state().await;
    }
    Json(serde_json::json!({ "prepared": true }))
}

#[derive(Deserialize)]
pub struct SetupLinkRequest {
    pub token: String,
}

pub async fn register_setup_link(
    State(state): State<AppState>,
    Json(body): Json<SetupLinkRequest>,
) -> impl IntoResponse {
    state.setup_links.register(&body.token);
    Json(serde_json::json!({ "registered": true }))
}

pub async fn wait_setup_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let Some(rx) = state.setup_links.take_receiver(&token) else {
        return not_found("unknown or already-consumed setup link token").into_response();
    };
    match wait_for_link(rx).await {
        Some(identity) => Json(identity).into_response(),
        None => not_found("setup link was never resolved").into_response(),
    }
}
