//! Identity handler.

use crate::models::NewUserResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /newUser
///
/// Issues a fresh participant id. Roles alternate investor, idea, investor...
#[instrument(skip_all, name = "broker.identity.issue")]
pub async fn new_user(State(state): State<Arc<AppState>>) -> Json<NewUserResponse> {
    let participant = state.matchmaking.issue_identity().await;

    Json(NewUserResponse {
        user_id: participant.id,
        user_role: participant.role,
    })
}
