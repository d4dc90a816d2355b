//! Control surface under `/__sw`: messages, client events, connectivity
//! and deployment of new worker versions.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{debug, info};

use super::state::AppState;
use super::types::{ApiError, UpdateResponse};
use crate::domain::{ControlMessage, MessageEnvelope, RegistrationStatus, SyncReport};

pub fn create_control_router() -> Router<AppState> {
    Router::new()
        .route("/message", post(post_message))
        .route("/events", get(events))
        .route("/online", post(online))
        .route("/status", get(status))
        .route("/update", post(update))
}

/// Delivers a control message. Messages that expect a reply wait for it;
/// `SKIP_WAITING` and unrecognised payloads are accepted without one.
pub async fn post_message(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(message) = ControlMessage::parse(&body) else {
        debug!("Ignoring unrecognised control message");
        return StatusCode::ACCEPTED.into_response();
    };

    if message == ControlMessage::SkipWaiting {
        state
            .registration
            .post_message(MessageEnvelope::new(message))
            .await;
        return StatusCode::ACCEPTED.into_response();
    }

    let (envelope, reply) = MessageEnvelope::with_reply(message);
    state.registration.post_message(envelope).await;

    match reply.await {
        Ok(reply) => Json(reply).into_response(),
        Err(_) => ApiError::no_controller().into_response(),
    }
}

/// Server-sent stream of client events
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.registration.clients().subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|item| {
        let event = item.ok()?;
        Event::default()
            .event(event.event_type())
            .json_data(&event)
            .ok()
            .map(Ok::<_, Infallible>)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Connectivity returned: refresh the sync endpoints now
pub async fn online(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    state
        .registration
        .notify_online()
        .await
        .map(Json)
        .ok_or_else(ApiError::no_controller)
}

pub async fn status(State(state): State<AppState>) -> Json<RegistrationStatus> {
    Json(state.registration.status().await)
}

/// Installs a worker built from the current configuration
pub async fn update(State(state): State<AppState>) -> Result<Json<UpdateResponse>, ApiError> {
    let worker = state.deploy().await?;
    info!(version = %worker.version(), state = ?worker.state(), "Deployed worker version");

    Ok(Json(UpdateResponse {
        version: worker.version().to_string(),
        state: worker.state(),
    }))
}
