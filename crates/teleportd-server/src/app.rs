// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Router assembly: wires every handler behind bearer auth and a body-size
//! cap, except `/health`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use teleportd_teleport::{ReloadCoordinator, ReloadNotifier, SessionManager, TeleportController, TeleportNotifier};
use tokio::sync::Mutex;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{bearer_auth_mw, AsAuthState, AuthState};
use crate::routes;
use crate::setup_link::SetupLinkRegistry;
use crate::sse::ConnectionTracker;

/// Default request body cap (§4.7): 4 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<Mutex<SessionManager>>,
    pub connections: Arc<ConnectionTracker>,
    pub reload: Arc<ReloadCoordinator>,
    pub teleport: Arc<TeleportController>,
    pub setup_links: Arc<SetupLinkRegistry>,
    pub teleport_notifier: Arc<dyn TeleportNotifier>,
    pub reload_notifier: Arc<dyn ReloadNotifier>,
    pub auth: Arc<AuthState>,
    pub sse_keepalive_secs: u64,
    pub max_body_bytes: usize,
}

impl AsAuthState for AppState {
    fn auth_state(&self) -> &AuthState {
        &self.auth
    }
}

/// Builds the full router: `/health` unauthenticated, everything else
/// behind bearer auth and the configured body-size cap.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    let protected = Router::new()
        .route("/teleport", post(routes::teleport))
        .route("/stream", get(routes::stream))
        .route("/api/can-reload", get(routes::can_reload))
        .route("/api/request-reload", post(routes::request_reload))
        .route("/api/force-reload", post(routes::force_reload))
        .route("/api/prepare-reload", post(routes::prepare_reload))
        .route("/api/setup-link", post(routes::register_setup_link))
        .route("/api/setup-link/:token", get(routes::wait_setup_link))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_mw::<AppState>,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves `router` until the process is signalled to stop, with
/// `ConnectInfo<SocketAddr>` available to the auth middleware.
pub async fn serve(router: Router, bind: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct NoopTeleportNotifier;
    #[async_trait]
    impl TeleportNotifier for NoopTeleportNotifier {
        async fn notify_teleport(&self, _chat_identity: &str, _cwd: &str) {}
    }

    struct NoopReloadNotifier;
    #[async_trait]
    impl ReloadNotifier for NoopReloadNotifier {
        async fn notify_reload_pending(&self) {}
        async fn notify_reloading(&self) {}
    }

    fn test_state() -> (AppState, String) {
        let snapshot_path = std::env::temp_dir().join("teleportd-test-app-snapshot.json");
        let raw = crate::token::RawToken::generate();
        let raw_str = raw.as_str().to_string();
        let stored = raw.into_stored();
        let auth = AuthState::with_defaults(stored);
        let state = AppState {
            sessions: Arc::new(Mutex::new(SessionManager::new(snapshot_path))),
            connections: Arc::new(ConnectionTracker::new()),
            reload: Arc::new(ReloadCoordinator::new()),
            teleport: Arc::new(TeleportController::new()),
            setup_links: Arc::new(SetupLinkRegistry::new()),
            teleport_notifier: Arc::new(NoopTeleportNotifier),
            reload_notifier: Arc::new(NoopReloadNotifier),
            auth: Arc::new(auth),
            sse_keepalive_secs: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        };
        (state, raw_str)
    }

    fn with_peer(mut request: Request<Body>) -> Request<Body> {
        request.extensions_mut().insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));
        request
    }

    #[tokio::test]
    async fn health_requires_no_token() {
        let (state, _token) = test_state();
        let router = build_router(state);
        let request = with_peer(Request::builder().uri("/health").body(Body::empty()).unwrap());
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_route_without_token_is_unauthorized() {
        let (state, _token) = test_state();
        let router = build_router(state);
        let request = with_peer(Request::builder().uri("/api/can-reload").body(Body::empty()).unwrap());
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_with_token_succeeds() {
        let (state, token) = test_state();
        let router = build_router(state);
        let request = with_peer(
            Request::builder()
                .uri("/api/can-reload")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        );
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
