//! Archive (recording) handlers.

use crate::errors::BrokerError;
use crate::models::{ArchiveResponse, SessionRequest};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use common::types::SessionId;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /archive/start
///
/// 409 if the session is already being recorded.
#[instrument(skip_all, name = "broker.archive.start", fields(session_id = %request.session_id))]
pub async fn start_archive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<ArchiveResponse>, BrokerError> {
    let session_id = SessionId(request.session_id);
    let archive_id = state.matchmaking.start_recording(&session_id).await?;

    Ok(Json(ArchiveResponse {
        session_id,
        archive_id,
    }))
}

/// Handler for POST /archive/stop
///
/// 404 if no recording is running on the session.
#[instrument(skip_all, name = "broker.archive.stop", fields(session_id = %request.session_id))]
pub async fn stop_archive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<ArchiveResponse>, BrokerError> {
    let session_id = SessionId(request.session_id);
    let archive_id = state.matchmaking.stop_recording(&session_id).await?;

    Ok(Json(ArchiveResponse {
        session_id,
        archive_id,
    }))
}
