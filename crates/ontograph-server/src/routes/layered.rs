//! Layered session routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ontograph_store::{timeline, Snapshot};

use super::{error_response, CreateSessionRequest, ListQuery};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/layered-sessions", get(list_sessions).post(create_session))
        .route("/layered-sessions/{id}", get(get_session).delete(delete_session))
        .route("/layered-sessions/{id}/timeline", get(get_timeline))
        .route("/layered-sessions/{id}/layers/{layer_id}", get(get_layer))
}

/// GET /api/layered-sessions
async fn list_sessions(State(state): State<Arc<AppState>>, Query(query): Query<ListQuery>) -> Response {
    let sessions = state.layered.list_sessions(query.limit()).await;
    Json(serde_json::json!({ "sessions": sessions })).into_response()
}

/// POST /api/layered-sessions
async fn create_session(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req = CreateSessionRequest::from_body(&body);
    match state.layered.create_session(req.topic.as_deref()).await {
        Some(session) => (StatusCode::CREATED, Json(session)).into_response(),
        None => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to create session. Backend may be unavailable.",
        ),
    }
}

/// GET /api/layered-sessions/{id}: metadata plus every layer, oldest first.
async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.layered.snapshot(&id).await {
        Snapshot::Found(snapshot) => Json(snapshot).into_response(),
        Snapshot::NotFound => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Snapshot::Unavailable => error_response(StatusCode::SERVICE_UNAVAILABLE, "Backend unavailable"),
    }
}

/// DELETE /api/layered-sessions/{id}: removes every layer with the session.
async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if state.layered.get_session(&id).await.is_none() {
        return error_response(StatusCode::NOT_FOUND, "Session not found");
    }
    if !state.layered.delete_session(&id).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete session");
    }
    Json(serde_json::json!({ "success": true })).into_response()
}

/// GET /api/layered-sessions/{id}/timeline
async fn get_timeline(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.layered.snapshot(&id).await {
        Snapshot::Found(snapshot) => Json(serde_json::json!({
            "sessionId": id,
            "entries": timeline(&snapshot.layers),
        }))
        .into_response(),
        Snapshot::NotFound => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Snapshot::Unavailable => error_response(StatusCode::SERVICE_UNAVAILABLE, "Backend unavailable"),
    }
}

/// GET /api/layered-sessions/{id}/layers/{layer_id}
async fn get_layer(
    State(state): State<Arc<AppState>>,
    Path((id, layer_id)): Path<(String, String)>,
) -> Response {
    match state.layered.get_layer(&id, &layer_id).await {
        Some(layer) => Json(layer).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Layer not found"),
    }
}
