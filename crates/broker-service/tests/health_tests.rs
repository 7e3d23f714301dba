//! Health, metrics and CORS integration tests.
//!
//! Uses the `TestBrokerServer` harness.

use broker_test_utils::TestBrokerServer;

/// Test that health endpoint returns 200 and healthy status.
#[tokio::test]
async fn test_health_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestBrokerServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["provider"], "mock");

    Ok(())
}

/// Test that health endpoint returns JSON content type.
#[tokio::test]
async fn test_health_endpoint_returns_json() -> Result<(), anyhow::Error> {
    let server = TestBrokerServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    assert!(
        content_type.is_some_and(|ct| ct.contains("application/json")),
        "Expected application/json content type, got {:?}",
        content_type
    );

    Ok(())
}

/// Test that non-existent routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestBrokerServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/v1/nonexistent", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 404);

    Ok(())
}

/// Test that the metrics endpoint answers with Prometheus text.
#[tokio::test]
async fn test_metrics_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestBrokerServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that cross-origin browser requests are allowed.
#[tokio::test]
async fn test_cors_allows_any_origin() -> Result<(), anyhow::Error> {
    let server = TestBrokerServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/newUser", server.url()))
        .header("Origin", "http://localhost:8080")
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    Ok(())
}

/// Test that CORS preflight for the queue endpoint succeeds.
#[tokio::test]
async fn test_cors_preflight() -> Result<(), anyhow::Error> {
    let server = TestBrokerServer::spawn().await?;

    let response = server
        .client()
        .request(reqwest::Method::OPTIONS, format!("{}/queue", server.url()))
        .header("Origin", "http://localhost:8080")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await?;

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key("access-control-allow-methods"));

    Ok(())
}
