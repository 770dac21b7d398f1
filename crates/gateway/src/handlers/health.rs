//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
    pub vector_store: String,
    pub web_search_enabled: bool,
}

/// Liveness check - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness check - reports session load and configured backends
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready".to_string(),
        version: quro_common::VERSION.to_string(),
        active_sessions: state.sessions.len().await,
        vector_store: state.config.vector_store.provider.clone(),
        web_search_enabled: state.config.web_search.api_key.is_some(),
    })
}
