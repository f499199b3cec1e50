// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! HTTP/SSE surface: teleport ingress, bearer auth, the session event
//! stream, reload handshake endpoints, and setup-link rendezvous.

mod app;
mod auth;
mod routes;
mod setup_link;
mod sse;
pub mod token;

pub use app::{build_router, serve, AppState, DEFAULT_MAX_BODY_BYTES};
pub use auth::{AsAuthState, AuthState};
pub use setup_link::{LinkedIdentity, SetupLinkRegistry};
pub use sse::{is_wrapper_managed, should_self_shutdown, ConnectionTracker, WRAPPER_MANAGED_ENV};
