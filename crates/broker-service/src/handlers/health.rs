//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Liveness probe.
///
/// The broker keeps no external connections open, so it is healthy whenever
/// it can answer. Provider reachability is reported through provider metrics
/// instead of probed here.
///
/// ## Example Response
///
/// ```json
/// { "status": "healthy", "provider": "opentok" }
/// ```
#[instrument(skip_all, name = "broker.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        provider: state.matchmaking.provider_name().to_string(),
    })
}
