//! Test server harness for E2E testing
//!
//! Provides `TestBrokerServer`, a real broker router on a random local port
//! with the video provider replaced by `MockVideoClient`.

use broker_service::config::Config;
use broker_service::models::NewUserResponse;
use broker_service::observability::metrics::detached_metrics_handle;
use broker_service::routes::{self, AppState};
use broker_service::services::video_client::mock::MockVideoClient;
use broker_service::services::MatchmakingService;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the broker in E2E tests.
///
/// Every instance has its own registry, so tests do not share state.
pub struct TestBrokerServer {
    addr: SocketAddr,
    config: Config,
    video: Arc<MockVideoClient>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestBrokerServer {
    /// Spawn a server whose provider calls all succeed.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Arc::new(MockVideoClient::accepting())).await
    }

    /// Spawn a server backed by the given mock provider.
    ///
    /// Keep a clone of the `Arc` to flip the mock into failure mode mid-test.
    pub async fn spawn_with(video: Arc<MockVideoClient>) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            ("TOKBOX_API_KEY".to_string(), "test-api-key".to_string()),
            ("TOKBOX_SECRET".to_string(), "test-api-secret".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState {
            matchmaking: Arc::new(MatchmakingService::new(video.clone())),
        });

        // A global recorder can only be installed once per process
        let metrics_handle = detached_metrics_handle()
            .map_err(|e| anyhow::anyhow!("Failed to build metrics handle: {}", e))?;

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            video,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock provider behind this server.
    pub fn video(&self) -> &MockVideoClient {
        &self.video
    }

    /// Shared HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// `GET /newUser`, decoded.
    pub async fn new_user(&self) -> Result<NewUserResponse, anyhow::Error> {
        let response = self
            .client
            .get(format!("{}/newUser", self.url()))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// `POST /queue` for an issued participant. Returns the raw response so
    /// tests can check error statuses.
    pub async fn enqueue(&self, user: &NewUserResponse) -> Result<reqwest::Response, anyhow::Error> {
        self.post_json(
            "/queue",
            json!({ "userId": user.user_id, "userRole": user.user_role }),
        )
        .await
    }

    /// `POST /queue/leave`.
    pub async fn leave(&self, user: &NewUserResponse) -> Result<reqwest::Response, anyhow::Error> {
        self.post_json("/queue/leave", json!({ "userId": user.user_id }))
            .await
    }

    /// POST a JSON body to `path`.
    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}{}", self.url(), path))
            .json(&body)
            .send()
            .await?)
    }

    /// `GET /servertest` as raw JSON.
    pub async fn snapshot(&self) -> Result<serde_json::Value, anyhow::Error> {
        let response = self
            .client
            .get(format!("{}/servertest", self.url()))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

impl Drop for TestBrokerServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestBrokerServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["provider"], "mock");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestBrokerServer::spawn().await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));

        Ok(())
    }

    #[tokio::test]
    async fn test_servers_are_isolated() -> Result<(), anyhow::Error> {
        let first = TestBrokerServer::spawn().await?;
        let second = TestBrokerServer::spawn().await?;

        let investor = first.new_user().await?;
        first.enqueue(&investor).await?.error_for_status()?;

        let snapshot = second.snapshot().await?;
        assert_eq!(snapshot["investorQueue"], json!([]));
        assert_eq!(second.video().sessions_created(), 0);

        Ok(())
    }
}
