//! Session handlers
//!
//! Each route locks the session's orchestrator for the duration of the
//! call, so requests within one session run one at a time while separate
//! sessions proceed concurrently.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quro_common::{
    errors::{AppError, Result},
    models::{Mode, QueryResponse},
};
use quro_context::ResearchAssistant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;
use validator::Validate;

use super::validate_request;
use crate::state::AppState;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 4000))]
    pub text: String,
}

/// Upload request; the path is read on the gateway host
#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 4096))]
    pub path: String,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub mode: Mode,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub uploaded: bool,
    pub mode: Mode,
}

#[derive(Serialize)]
pub struct ModeResponse {
    pub mode: Mode,
}

/// Create a new session in corpus mode
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    let session_id = state.sessions.create().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            mode: Mode::Corpus,
        }),
    ))
}

/// Answer a query in the session's current mode
pub async fn query(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    validate_request(&request)?;

    let session = state.sessions.get(session_id).await?;
    let mut assistant = session.lock().await;

    let timeout = state.config.request_timeout();
    let response = tokio::time::timeout(timeout, assistant.ask(&request.text))
        .await
        .map_err(|_| {
            tracing::warn!(session_id = %session_id, "Query timed out");
            AppError::RequestTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        })??;

    Ok(Json(response))
}

/// Load a document and switch the session to document mode
pub async fn upload(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    validate_request(&request)?;

    let session = state.sessions.get(session_id).await?;
    let mut assistant = session.lock().await;

    let uploaded = assistant.upload(&PathBuf::from(&request.path)).await;
    let status = if uploaded {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    Ok((
        status,
        Json(UploadResponse {
            uploaded,
            mode: assistant.mode(),
        }),
    ))
}

/// Return the session to corpus mode
pub async fn reset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ModeResponse>> {
    let session = state.sessions.get(session_id).await?;
    let mut assistant = session.lock().await;
    assistant.reset();

    Ok(Json(ModeResponse {
        mode: assistant.mode(),
    }))
}

/// Forget the conversation, keeping the mode
pub async fn clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    let session = state.sessions.get(session_id).await?;
    session.lock().await.clear_history();
    Ok(StatusCode::NO_CONTENT)
}

/// Drop a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions.remove(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
