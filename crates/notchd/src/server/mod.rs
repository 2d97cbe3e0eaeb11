//! HTTP ingress for hook events.
//!
//! The hook script POSTs one JSON payload per lifecycle event to this
//! server; handlers deserialize at the boundary and forward an
//! `IngressEvent` into the registry channel, so the state machine only
//! ever sees well-formed events on its own task. Queries (`/status`,
//! `/sessions`) go through the same channel and therefore never observe
//! a half-applied event.
//!
//! Malformed JSON is rejected here with a client error; the daemon
//! refuses to start when the port is taken.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use notch_protocol::{HookPayload, IngressEvent, PinPayload, SessionSnapshot, StatusSnapshot};

use crate::registry::RegistryHandle;

/// Errors from the ingress server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listen address could not be bound (typically: port in use).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    registry: RegistryHandle,
}

/// Builds the ingress router.
pub fn create_app(registry: RegistryHandle) -> Router {
    Router::new()
        .route("/hook", post(post_hook))
        .route("/pin", post(post_pin))
        .route("/unpin", post(post_unpin))
        .route("/health", get(get_health))
        .route("/status", get(get_status))
        .route("/sessions", get(get_sessions))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry })
}

/// Binds the listener and serves until the token is cancelled.
pub async fn serve(
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!(%addr, "hook server listening");

    let app = create_app(registry);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn post_hook(
    State(state): State<AppState>,
    Json(payload): Json<HookPayload>,
) -> Result<Json<Value>, StatusCode> {
    state
        .registry
        .send_event(IngressEvent::Hook(Box::new(payload)))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(ok_response())
}

async fn post_pin(
    State(state): State<AppState>,
    Json(payload): Json<PinPayload>,
) -> Result<Json<Value>, StatusCode> {
    state
        .registry
        .send_event(IngressEvent::Pin(payload))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(ok_response())
}

async fn post_unpin(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    state
        .registry
        .send_event(IngressEvent::Unpin)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(ok_response())
}

async fn get_health() -> Json<Value> {
    Json(json!({"status": "running"}))
}

async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, StatusCode> {
    state
        .registry
        .status()
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_sessions(State(state): State<AppState>) -> Json<Vec<SessionSnapshot>> {
    Json(state.registry.display_sessions().await)
}

fn ok_response() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
