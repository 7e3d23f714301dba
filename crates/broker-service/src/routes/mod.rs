//! HTTP routes for the broker.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::MatchmakingService;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Matchmaking over the in-memory registry.
    pub matchmaking: Arc<MatchmakingService>,
}

/// Build the application routes.
///
/// Browser clients are served from another origin, hence permissive CORS.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/newUser", get(handlers::new_user))
        .route("/queue", post(handlers::enqueue))
        .route("/queue/leave", post(handlers::leave))
        .route("/archive/start", post(handlers::start_archive))
        .route("/archive/stop", post(handlers::stop_archive))
        .route("/broadcast/start", post(handlers::start_broadcast))
        .route("/broadcast/stop", post(handlers::stop_broadcast))
        .route("/servertest", get(handlers::server_test))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. http_metrics_middleware - outermost, sees every response
    // 2. CorsLayer
    // 3. TimeoutLayer
    // 4. TraceLayer - innermost
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
