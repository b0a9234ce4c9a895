//! Axum router and HTTP handlers for stb-bot.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::{
    api_types::{DispatchOutcome, HealthResponse, InboundMessage},
    commands::dispatch,
    state::{AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/events/message", post(message_event))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.clone(),
            version: st.build.version.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.status_snapshot().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/events/message
// ---------------------------------------------------------------------------

/// Relay ingress: one chat message in, the dispatch outcome out.
pub(crate) async fn message_event(
    State(st): State<Arc<AppState>>,
    Json(msg): Json<InboundMessage>,
) -> (StatusCode, Json<DispatchOutcome>) {
    let outcome = dispatch(&st, &msg).await;
    debug!(message_id = %msg.message_id, ?outcome, "message dispatched");
    if !matches!(outcome, DispatchOutcome::Ignored) {
        let _ = st.bus.send(BusMsg::Status(st.status_snapshot().await));
    }
    (StatusCode::OK, Json(outcome))
}

/// `GET /v1/stream`: the event bus as server-sent events. Lagged receivers
/// skip what they missed.
pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let events = BroadcastStream::new(st.bus.subscribe()).filter_map(|msg| async move {
        let msg = msg.ok()?;
        let data = serde_json::to_string(&msg).ok()?;
        Some(Ok::<_, Infallible>(
            Event::default().event(msg.event_name()).data(data),
        ))
    });

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(events).keep_alive(KeepAlive::new()),
    )
        .into_response()
}
