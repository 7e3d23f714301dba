//! Broadcast (HLS streaming) handlers.

use crate::errors::BrokerError;
use crate::models::{BroadcastStartResponse, BroadcastStopResponse, SessionRequest};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use common::types::SessionId;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /broadcast/start
#[instrument(skip_all, name = "broker.broadcast.start", fields(session_id = %request.session_id))]
pub async fn start_broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<BroadcastStartResponse>, BrokerError> {
    let session_id = SessionId(request.session_id);
    let broadcast = state.matchmaking.start_streaming(&session_id).await?;

    Ok(Json(BroadcastStartResponse {
        session_id,
        broadcast_id: broadcast.id,
        hls_url: broadcast.hls_url,
    }))
}

/// Handler for POST /broadcast/stop
#[instrument(skip_all, name = "broker.broadcast.stop", fields(session_id = %request.session_id))]
pub async fn stop_broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<BroadcastStopResponse>, BrokerError> {
    let session_id = SessionId(request.session_id);
    let broadcast_id = state.matchmaking.stop_streaming(&session_id).await?;

    Ok(Json(BroadcastStopResponse {
        session_id,
        broadcast_id,
    }))
}
