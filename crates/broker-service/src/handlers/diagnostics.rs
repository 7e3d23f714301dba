//! Diagnostics handler.
//!
//! Dumps the whole broker state. Participant ids and session ids are
//! included; tokens are not.

use crate::routes::AppState;
use crate::services::RegistrySnapshot;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /servertest
#[instrument(skip_all, name = "broker.diagnostics.snapshot")]
pub async fn server_test(State(state): State<Arc<AppState>>) -> Json<RegistrySnapshot> {
    Json(state.matchmaking.snapshot().await)
}
