//! Queue handlers.
//!
//! `POST /queue` either pairs the caller with a waiting participant of the
//! other role (joining that participant's session) or creates a new session
//! and leaves the caller waiting in it. `POST /queue/leave` withdraws a
//! waiting participant.

use crate::errors::BrokerError;
use crate::models::{LeaveRequest, LeaveResponse, QueueRequest, QueueResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use common::types::{ParticipantId, Role};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /queue
///
/// # Errors
///
/// - 400 for a malformed `userId` or unknown `userRole`
/// - 409 if the participant is already waiting
/// - 502 if the video provider could not create a session
#[instrument(skip_all, name = "broker.queue.enqueue", fields(user_role = %request.user_role))]
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueueRequest>,
) -> Result<Json<QueueResponse>, BrokerError> {
    let participant = parse_participant_id(&request.user_id)?;
    let role: Role = request
        .user_role
        .parse()
        .map_err(|e: common::types::ParseRoleError| BrokerError::BadRequest(e.to_string()))?;

    let outcome = state
        .matchmaking
        .enqueue_or_match(participant, role)
        .await?;

    Ok(Json(QueueResponse {
        api_key: outcome.credentials.api_key,
        session_id: outcome.credentials.session_id,
        token: outcome.credentials.token,
        status: outcome.status,
        partner_id: outcome.partner,
    }))
}

/// Handler for POST /queue/leave
///
/// Always succeeds for a well-formed id; `removed` says whether the
/// participant was actually waiting.
#[instrument(skip_all, name = "broker.queue.leave")]
pub async fn leave(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LeaveRequest>,
) -> Result<Json<LeaveResponse>, BrokerError> {
    let participant = parse_participant_id(&request.user_id)?;
    let removed = state.matchmaking.leave_queue(participant).await;

    Ok(Json(LeaveResponse {
        user_id: participant,
        removed,
    }))
}

fn parse_participant_id(raw: &str) -> Result<ParticipantId, BrokerError> {
    raw.trim()
        .parse()
        .map_err(|_| BrokerError::BadRequest("userId must be a UUID".to_string()))
}
