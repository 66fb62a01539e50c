//! Health route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health: backend availability and extraction provider.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let backend = state.backend();
    let llm = state.extractor.status();

    Json(serde_json::json!({
        "status": "ok",
        "service": "ontograph",
        "backend": backend.availability().await,
        "backendKind": backend.kind(),
        "llmAvailable": llm.available,
        "llmProvider": llm.provider,
        "llmModel": llm.model,
        "linkIdentity": state.config.link_identity,
        "views": state.views.len(),
    }))
}
