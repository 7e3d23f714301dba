//! Broker error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Provider
//! and consistency failures return generic messages to clients; the details
//! are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Broker error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - SessionNotFound, Internal: 500 Internal Server Error
/// - Provider: 502 Bad Gateway
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The video provider failed or returned something unusable.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A matched participant had no session record. Registry state is
    /// inconsistent; never retried.
    #[error("Session record missing for participant {0}")]
    SessionNotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl BrokerError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            BrokerError::BadRequest(_) => 400,
            BrokerError::NotFound(_) => 404,
            BrokerError::Conflict(_) => 409,
            BrokerError::SessionNotFound(_) | BrokerError::Internal => 500,
            BrokerError::Provider(_) => 502,
        }
    }

    /// Short label used as the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::BadRequest(_) => "bad_request",
            BrokerError::NotFound(_) => "not_found",
            BrokerError::Conflict(_) => "conflict",
            BrokerError::Provider(_) => "provider",
            BrokerError::SessionNotFound(_) => "session_not_found",
            BrokerError::Internal => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            BrokerError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            BrokerError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            BrokerError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            BrokerError::Provider(reason) => {
                tracing::warn!(target: "broker.provider", reason = %reason, "Video provider call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "PROVIDER_ERROR",
                    "The video provider is unavailable".to_string(),
                )
            }
            BrokerError::SessionNotFound(participant) => {
                tracing::error!(
                    target: "broker.registry",
                    participant_id = %participant,
                    "Matched participant has no session record"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_NOT_FOUND",
                    "An internal error occurred".to_string(),
                )
            }
            BrokerError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BrokerError::BadRequest("unknown role".to_string()).to_string(),
            "Bad request: unknown role"
        );
        assert_eq!(
            BrokerError::Provider("timeout".to_string()).to_string(),
            "Provider error: timeout"
        );
        assert_eq!(
            BrokerError::SessionNotFound("abc".to_string()).to_string(),
            "Session record missing for participant abc"
        );
        assert_eq!(BrokerError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BrokerError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(BrokerError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(BrokerError::Conflict("x".to_string()).status_code(), 409);
        assert_eq!(BrokerError::Provider("x".to_string()).status_code(), 502);
        assert_eq!(
            BrokerError::SessionNotFound("x".to_string()).status_code(),
            500
        );
        assert_eq!(BrokerError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_provider_error_is_generic() {
        let error = BrokerError::Provider("HTTP 500 from session/create".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "PROVIDER_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "The video provider is unavailable"
        );
    }

    #[tokio::test]
    async fn test_into_response_session_not_found() {
        let response = BrokerError::SessionNotFound("p-1".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "SESSION_NOT_FOUND");
        assert_eq!(body_json["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_into_response_bad_request() {
        let response = BrokerError::BadRequest("unknown role: host".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "BAD_REQUEST");
        assert_eq!(body_json["error"]["message"], "unknown role: host");
    }

    #[tokio::test]
    async fn test_into_response_conflict() {
        let response = BrokerError::Conflict("Participant is already waiting".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = BrokerError::NotFound("No active archive".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "NOT_FOUND");
        assert_eq!(body_json["error"]["message"], "No active archive");
    }

    #[tokio::test]
    async fn test_into_response_internal() {
        let response = BrokerError::Internal.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "INTERNAL_ERROR");
    }
}
