//! Metrics definitions for the broker.
//!
//! All metrics follow Prometheus naming conventions:
//! - `broker_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP verbs
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `status`: success, error, timeout
//! - `operation`: the six provider operations
//! - `role`: investor, idea
//! - `outcome`: matched, queued, error

use common::types::Role;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    configured_builder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Build a handle without installing a global recorder.
///
/// Used by test servers, which run many routers in one process.
///
/// # Errors
///
/// Returns error if the bucket configuration is rejected.
pub fn detached_metrics_handle() -> Result<PrometheusHandle, String> {
    Ok(configured_builder()?.build_recorder().handle())
}

fn configured_builder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("broker_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Provider calls cross the internet; wider buckets
        .set_buckets_for_metric(
            Matcher::Prefix("broker_provider_request".to_string()),
            &[
                0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set provider request buckets: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `broker_http_requests_total`, `broker_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("broker_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("broker_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
///
/// None of the broker's routes carry path parameters, so anything not in the
/// table collapses to `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/newUser" => "/newUser",
        "/queue" => "/queue",
        "/queue/leave" => "/queue/leave",
        "/archive/start" => "/archive/start",
        "/archive/stop" => "/archive/stop",
        "/broadcast/start" => "/broadcast/start",
        "/broadcast/stop" => "/broadcast/stop",
        "/servertest" => "/servertest",
        _ => "/other",
    }
}

// ============================================================================
// Matchmaking Metrics
// ============================================================================

/// Record a newly issued identity.
///
/// Metric: `broker_identities_issued_total`
/// Labels: `role`
pub fn record_identity_issued(role: Role) {
    counter!("broker_identities_issued_total", "role" => role.as_str()).increment(1);
}

/// Record the outcome of an enqueue-or-match request.
///
/// Metric: `broker_queue_requests_total`
/// Labels: `role`, `outcome`
pub fn record_queue_outcome(role: Role, outcome: &'static str) {
    counter!("broker_queue_requests_total",
        "role" => role.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a participant leaving the queue.
///
/// Metric: `broker_queue_leaves_total`
/// Labels: `removed` (whether the participant was actually waiting)
pub fn record_queue_leave(removed: bool) {
    counter!("broker_queue_leaves_total",
        "removed" => if removed { "true" } else { "false" }
    )
    .increment(1);
}

/// Set the current waiting-queue depths.
///
/// Metric: `broker_queue_depth`
/// Labels: `role`
pub fn set_queue_depth(investors: usize, ideas: usize) {
    gauge!("broker_queue_depth", "role" => Role::Investor.as_str()).set(investors as f64);
    gauge!("broker_queue_depth", "role" => Role::Idea.as_str()).set(ideas as f64);
}

/// Set the number of pairings recorded since start.
///
/// Metric: `broker_match_history_size`
pub fn set_match_history_size(pairs: usize) {
    gauge!("broker_match_history_size").set(pairs as f64);
}

// ============================================================================
// Provider Metrics
// ============================================================================

/// Record a call to the video provider REST API.
///
/// Metric: `broker_provider_request_duration_seconds`, `broker_provider_requests_total`
/// Labels: `operation`, `status`
///
/// Operations: create_session, start_archive, stop_archive, start_broadcast,
/// stop_broadcast.
pub fn record_provider_request(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("broker_provider_request_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("broker_provider_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a locally minted session token.
///
/// Metric: `broker_tokens_issued_total`
/// Labels: `source` (`new_session` or `matched_session`)
pub fn record_token_issued(source: &'static str) {
    counter!("broker_tokens_issued_total", "source" => source).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_without_recorder() {
        // No recorder installed: the macros are no-ops and must not panic.
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("POST", "/queue", 502, Duration::from_millis(250));
        record_identity_issued(Role::Investor);
        record_queue_outcome(Role::Idea, "matched");
        record_queue_leave(false);
        set_queue_depth(3, 1);
        set_match_history_size(7);
        record_provider_request("create_session", "success", Duration::from_millis(80));
        record_token_issued("matched_session");
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(409), "error");
        assert_eq!(categorize_status_code(502), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/newUser"), "/newUser");
        assert_eq!(normalize_endpoint("/queue"), "/queue");
        assert_eq!(normalize_endpoint("/queue/leave"), "/queue/leave");
        assert_eq!(normalize_endpoint("/archive/stop"), "/archive/stop");
        assert_eq!(normalize_endpoint("/broadcast/start"), "/broadcast/start");
        assert_eq!(normalize_endpoint("/servertest"), "/servertest");
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/newuser"), "/other");
        assert_eq!(normalize_endpoint("/queue/abc"), "/other");
        assert_eq!(normalize_endpoint("/archive"), "/other");
    }

    #[test]
    fn test_detached_handle_renders() {
        let handle = detached_metrics_handle().unwrap();
        assert!(!handle.render().contains("broker_http_requests_total"));
    }
}
