//! Flat session routes and the merged view of a session.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ontograph_merge::{connected_node_ids, GraphStats, SessionView};
use ontograph_store::Snapshot;
use tracing::info;

use super::{error_response, CreateSessionRequest, ListQuery};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/view", get(get_view))
        .route(
            "/sessions/{id}/view/nodes/{node_id}/connected",
            get(get_connected),
        )
}

/// GET /api/sessions: most recent first.
async fn list_sessions(State(state): State<Arc<AppState>>, Query(query): Query<ListQuery>) -> Response {
    let sessions = state.sessions.list_sessions(query.limit()).await;
    Json(serde_json::json!({ "sessions": sessions })).into_response()
}

/// POST /api/sessions
async fn create_session(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req = CreateSessionRequest::from_body(&body);
    match state.sessions.create_session(req.topic.as_deref()).await {
        Some(session) => (StatusCode::CREATED, Json(session)).into_response(),
        None => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Failed to create session. Backend may be unavailable.",
        ),
    }
}

/// GET /api/sessions/{id}: metadata plus stored ontology.
async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.sessions.snapshot(&id).await {
        Snapshot::Found(snapshot) => Json(snapshot).into_response(),
        Snapshot::NotFound => error_response(StatusCode::NOT_FOUND, "Session not found"),
        Snapshot::Unavailable => error_response(StatusCode::SERVICE_UNAVAILABLE, "Backend unavailable"),
    }
}

/// DELETE /api/sessions/{id}
async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if state.sessions.get_session(&id).await.is_none() {
        return error_response(StatusCode::NOT_FOUND, "Session not found");
    }
    if !state.sessions.delete_session(&id).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete session");
    }
    state.locks.remove(&id);
    if state.views.remove(&id) {
        info!("Dropped view for deleted session {}", id);
    }
    Json(serde_json::json!({ "success": true })).into_response()
}

/// The session's merged view, seeded from storage on first access.
pub(crate) async fn load_view(state: &AppState, id: &str) -> Result<SessionView, Response> {
    if let Some(view) = state.views.get(id) {
        return Ok(view);
    }
    let _guard = state.locks.lock(id).await;
    if let Some(view) = state.views.get(id) {
        return Ok(view);
    }
    match state.sessions.snapshot(id).await {
        Snapshot::Found(snapshot) => {
            state.views.seed(id, snapshot.ontology);
        }
        Snapshot::NotFound => return Err(error_response(StatusCode::NOT_FOUND, "Session not found")),
        Snapshot::Unavailable => {
            return Err(error_response(StatusCode::SERVICE_UNAVAILABLE, "Backend unavailable"))
        }
    }
    state
        .views
        .get(id)
        .ok_or_else(|| error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to build view"))
}

/// GET /api/sessions/{id}/view: deduplicated graph for display.
async fn get_view(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let view = match load_view(&state, &id).await {
        Ok(view) => view,
        Err(resp) => return resp,
    };
    let stats = GraphStats::of(&view.graph);
    Json(serde_json::json!({
        "sessionId": id,
        "nodes": view.graph.nodes,
        "links": view.graph.links,
        "batches": view.batches,
        "updatedAt": view.updated_at,
        "stats": stats,
    }))
    .into_response()
}

/// GET /api/sessions/{id}/view/nodes/{node_id}/connected: the node and its
/// direct neighbours.
async fn get_connected(
    State(state): State<Arc<AppState>>,
    Path((id, node_id)): Path<(String, String)>,
) -> Response {
    let view = match load_view(&state, &id).await {
        Ok(view) => view,
        Err(resp) => return resp,
    };
    let connected = connected_node_ids(&view.graph, &node_id);
    if connected.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "Node not found");
    }
    Json(serde_json::json!({
        "nodeId": node_id,
        "connected": connected,
    }))
    .into_response()
}
