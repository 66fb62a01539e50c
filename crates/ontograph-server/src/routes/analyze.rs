//! Text analysis routes: extraction followed by persistence.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use ontograph_core::LayerDraft;
use serde::Deserialize;
use tracing::{info, warn};

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/layered-analyze", post(layered_analyze))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

/// POST /api/analyze: extract with name hints, append to the session and
/// fold into its view. Returns the batch as extracted.
async fn analyze(State(state): State<Arc<AppState>>, Json(req): Json<AnalyzeRequest>) -> Response {
    let Some(text) = non_empty(req.text) else {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    };
    let session_id = non_empty(req.session_id);

    let names = state.sessions.existing_node_names(session_id.as_deref()).await;
    let batch = match state.extractor.extract(&text, Some(names.as_slice())).await {
        Ok(batch) => batch,
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to analyze text: {}", e))
        }
    };

    if let Some(id) = session_id.as_deref() {
        if !batch.is_empty() {
            let _guard = state.locks.lock(id).await;
            // The view must hold the graph as it was before this batch.
            if !state.views.contains(id) {
                let stored = state.sessions.get_ontology(id).await;
                state.views.seed(id, stored);
            }
            if !state.sessions.append_ontology(id, &batch).await {
                warn!("Analysis for session {} was not persisted", id);
            }
            let report = state.views.fold(id, &batch);
            info!(
                "Session {}: {} new nodes, {} reused, {} new links",
                id, report.nodes_added, report.nodes_reused, report.links_added
            );
        }
    }

    Json(batch).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayeredAnalyzeRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    agent_type: Option<String>,
}

/// POST /api/layered-analyze: extract without hints and store the result
/// as a new layer.
async fn layered_analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LayeredAnalyzeRequest>,
) -> Response {
    let Some(session_id) = non_empty(req.session_id) else {
        return error_response(StatusCode::BAD_REQUEST, "sessionId is required");
    };
    let Some(text) = non_empty(req.text) else {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    };

    let batch = match state.extractor.extract(&text, None).await {
        Ok(batch) => batch,
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to analyze text: {}", e))
        }
    };

    let draft = LayerDraft {
        agent_type: Some(req.agent_type.unwrap_or_default()),
        original_text: Some(text),
        ..Default::default()
    };
    let Some(meta) = state.layered.create_layer(&session_id, draft).await else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create layer");
    };

    if !batch.is_empty()
        && !state
            .layered
            .save_layer_ontology(&session_id, &meta.layer_id, &batch)
            .await
    {
        warn!("Layer {} of session {} was not persisted", meta.layer_id, session_id);
    }

    Json(serde_json::json!({
        "layerId": meta.layer_id,
        "timestamp": meta.timestamp,
        "agentType": meta.agent_type,
        "nodes": batch.nodes,
        "links": batch.links,
    }))
    .into_response()
}
