//! `OpenTokClient` tests against a wiremock stand-in for the provider API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use broker_service::config::Config;
use broker_service::errors::BrokerError;
use broker_service::services::{OpenTokClient, VideoClient};
use common::types::{ArchiveId, BroadcastId, SessionId};
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{body_json, body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "46000000";

fn client_for(server: &MockServer) -> OpenTokClient {
    let vars = HashMap::from([
        ("TOKBOX_API_KEY".to_string(), API_KEY.to_string()),
        ("TOKBOX_SECRET".to_string(), "project-secret".to_string()),
        ("VIDEO_API_URL".to_string(), server.uri()),
        ("PROVIDER_TIMEOUT_SECONDS".to_string(), "2".to_string()),
    ]);
    let config = Config::from_vars(&vars).expect("config");
    OpenTokClient::new(&config).expect("client")
}

#[tokio::test]
async fn test_create_session_posts_routed_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session/create"))
        .and(header_exists("X-OPENTOK-AUTH"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("p2p.preference=disabled"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "session_id": "1_MX40NjAwMDAwMH5-abc", "project_id": API_KEY }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server).create_session().await.unwrap();
    assert_eq!(session, SessionId("1_MX40NjAwMDAwMH5-abc".to_string()));
}

#[tokio::test]
async fn test_create_session_empty_response_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = client_for(&server).create_session().await;
    assert!(matches!(result, Err(BrokerError::Provider(_))));
}

#[tokio::test]
async fn test_create_session_server_error_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session/create"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client_for(&server).create_session().await;
    assert!(matches!(result, Err(BrokerError::Provider(_))));
}

#[tokio::test]
async fn test_rejected_credentials_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session/create"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Invalid token"})))
        .mount(&server)
        .await;

    let result = client_for(&server).create_session().await;
    assert!(matches!(result, Err(BrokerError::Provider(_))));
}

#[tokio::test]
async fn test_unparseable_body_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/session/create"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client_for(&server).create_session().await;
    assert!(matches!(result, Err(BrokerError::Provider(_))));
}

#[tokio::test]
async fn test_start_archive() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/project/{API_KEY}/archive")))
        .and(header_exists("X-OPENTOK-AUTH"))
        .and(body_json(json!({ "sessionId": "s-1", "name": "s-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b40ef09b-3811-4726-b508-e41a0f96c68f",
            "status": "started",
            "sessionId": "s-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let archive = client_for(&server)
        .start_archive(&SessionId("s-1".to_string()), "s-1")
        .await
        .unwrap();
    assert_eq!(
        archive,
        ArchiveId("b40ef09b-3811-4726-b508-e41a0f96c68f".to_string())
    );
}

#[tokio::test]
async fn test_stop_archive() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/project/{API_KEY}/archive/arch-1/stop")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "arch-1", "status": "stopped"})))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .stop_archive(&ArchiveId("arch-1".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stop_archive_conflict_is_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/project/{API_KEY}/archive/arch-1/stop")))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .stop_archive(&ArchiveId("arch-1".to_string()))
        .await;
    assert!(matches!(result, Err(BrokerError::Provider(_))));
}

#[tokio::test]
async fn test_start_broadcast_with_hls_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/project/{API_KEY}/broadcast")))
        .and(body_json(json!({ "sessionId": "s-1", "outputs": { "hls": {} } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "bc-1",
            "sessionId": "s-1",
            "broadcastUrls": { "hls": "https://cdn.example.test/bc-1/playlist.m3u8" },
            "status": "started"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let broadcast = client_for(&server)
        .start_broadcast(&SessionId("s-1".to_string()))
        .await
        .unwrap();

    assert_eq!(broadcast.id, BroadcastId("bc-1".to_string()));
    assert_eq!(
        broadcast.hls_url.as_deref(),
        Some("https://cdn.example.test/bc-1/playlist.m3u8")
    );
}

#[tokio::test]
async fn test_start_broadcast_without_urls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/project/{API_KEY}/broadcast")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "bc-2" })))
        .mount(&server)
        .await;

    let broadcast = client_for(&server)
        .start_broadcast(&SessionId("s-1".to_string()))
        .await
        .unwrap();
    assert!(broadcast.hls_url.is_none());
}

#[tokio::test]
async fn test_stop_broadcast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/v2/project/{API_KEY}/broadcast/bc-1/stop")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "bc-1", "status": "stopped" })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .stop_broadcast(&BroadcastId("bc-1".to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_generate_token_is_local() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let token = client
        .generate_token(&SessionId("s-1".to_string()))
        .unwrap();

    assert!(token.starts_with("T1=="));
    assert_eq!(client.api_key(), API_KEY);
    // No request reached the provider
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
