//! Video provider REST client.
//!
//! Talks to the OpenTok (Vonage Video) project API: session creation,
//! archives and HLS broadcasts. Participant tokens are minted locally.
//!
//! # Security
//!
//! - Every REST call carries a short-lived HS256 JWT in `X-OPENTOK-AUTH`
//! - The project secret never leaves the process and is never logged
//! - Timeouts prevent hanging connections
//! - Provider failures surface as `BrokerError::Provider` with details logged

use crate::config::Config;
use crate::errors::BrokerError;
use crate::observability::metrics::record_provider_request;
use crate::services::provider_token::mint_publisher_token;
use common::secret::{ExposeSecret, SecretString};
use common::types::{ArchiveId, BroadcastId, SessionId};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{header::ACCEPT, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Header carrying the project JWT.
const AUTH_HEADER: &str = "X-OPENTOK-AUTH";

/// Lifetime of the REST authentication JWT.
const AUTH_JWT_TTL_SECS: i64 = 300;

/// Connect timeout for provider requests in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Result of starting a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastStarted {
    pub id: BroadcastId,
    /// HLS playlist URL, when the provider has assigned one.
    pub hls_url: Option<String>,
}

/// Operations the broker needs from the video provider (enables mocking).
#[async_trait::async_trait]
pub trait VideoClient: Send + Sync {
    /// Public project key returned to clients alongside tokens.
    fn api_key(&self) -> &str;

    /// Short provider name for health reporting.
    fn provider_name(&self) -> &'static str;

    /// Create a routed session.
    async fn create_session(&self) -> Result<SessionId, BrokerError>;

    /// Mint a publisher token for an existing session.
    fn generate_token(&self, session_id: &SessionId) -> Result<String, BrokerError>;

    /// Start recording a session.
    async fn start_archive(
        &self,
        session_id: &SessionId,
        name: &str,
    ) -> Result<ArchiveId, BrokerError>;

    /// Stop a running recording.
    async fn stop_archive(&self, archive_id: &ArchiveId) -> Result<(), BrokerError>;

    /// Start an HLS broadcast of a session.
    async fn start_broadcast(&self, session_id: &SessionId)
        -> Result<BroadcastStarted, BrokerError>;

    /// Stop a running broadcast.
    async fn stop_broadcast(&self, broadcast_id: &BroadcastId) -> Result<(), BrokerError>;
}

#[derive(Debug, Serialize)]
struct AuthClaims<'a> {
    iss: &'a str,
    ist: &'static str,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSession {
    session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartArchiveRequest<'a> {
    session_id: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBroadcastRequest<'a> {
    session_id: &'a str,
    outputs: BroadcastOutputs,
}

#[derive(Debug, Serialize)]
struct BroadcastOutputs {
    hls: HlsOutput,
}

#[derive(Debug, Serialize)]
struct HlsOutput {}

#[derive(Debug, Deserialize)]
struct ProviderResource {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastResource {
    id: String,
    #[serde(default)]
    broadcast_urls: Option<BroadcastUrls>,
}

#[derive(Debug, Deserialize)]
struct BroadcastUrls {
    #[serde(default)]
    hls: Option<String>,
}

/// HTTP client for the OpenTok project REST API.
#[derive(Clone)]
pub struct OpenTokClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: SecretString,
    token_ttl_seconds: u64,
}

impl OpenTokClient {
    /// Create a client from broker configuration.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_seconds))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "broker.services.video_client", error = %e, "Failed to build HTTP client");
                BrokerError::Internal
            })?;

        Ok(Self {
            client,
            base_url: config.video_api_url.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            token_ttl_seconds: config.token_ttl_seconds,
        })
    }

    fn project_url(&self, suffix: &str) -> String {
        format!("{}/v2/project/{}/{}", self.base_url, self.api_key, suffix)
    }

    /// Sign a fresh project-level JWT for one request.
    fn auth_token(&self) -> Result<String, BrokerError> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AuthClaims {
            iss: &self.api_key,
            ist: "project",
            iat,
            exp: iat + AUTH_JWT_TTL_SECS,
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.api_secret.expose_secret().as_bytes()),
        )
        .map_err(|e| {
            error!(target: "broker.services.video_client", error = %e, "Failed to sign provider JWT");
            BrokerError::Internal
        })
    }

    /// Authenticate, send, time and status-check a provider request.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, BrokerError> {
        let start = Instant::now();

        let result = request
            .header(AUTH_HEADER, self.auth_token()?)
            .header(ACCEPT, "application/json")
            .send()
            .await;

        match result {
            Err(e) => {
                let status = if e.is_timeout() { "timeout" } else { "error" };
                record_provider_request(operation, status, start.elapsed());
                warn!(target: "broker.services.video_client", operation, error = %e, "Provider request failed");
                Err(BrokerError::Provider(format!("{operation}: {e}")))
            }
            Ok(response) if response.status().is_success() => {
                record_provider_request(operation, "success", start.elapsed());
                Ok(response)
            }
            Ok(response) => {
                record_provider_request(operation, "error", start.elapsed());
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if status.as_u16() == 401 || status.as_u16() == 403 {
                    error!(target: "broker.services.video_client", operation, status = %status, "Provider rejected project credentials");
                } else {
                    warn!(target: "broker.services.video_client", operation, status = %status, body = %body, "Provider returned error status");
                }
                Err(BrokerError::Provider(format!(
                    "{operation} returned {status}"
                )))
            }
        }
    }

    async fn parse<T: DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> Result<T, BrokerError> {
        response.json().await.map_err(|e| {
            error!(target: "broker.services.video_client", operation, error = %e, "Failed to parse provider response");
            BrokerError::Provider(format!("{operation}: unreadable response"))
        })
    }
}

#[async_trait::async_trait]
impl VideoClient for OpenTokClient {
    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn provider_name(&self) -> &'static str {
        "opentok"
    }

    #[instrument(skip_all)]
    async fn create_session(&self) -> Result<SessionId, BrokerError> {
        let request = self
            .client
            .post(format!("{}/session/create", self.base_url))
            // Routed media mode so sessions can be archived and broadcast
            .form(&[("p2p.preference", "disabled")]);

        let response = self.send("create_session", request).await?;
        let sessions: Vec<CreatedSession> = Self::parse("create_session", response).await?;

        sessions
            .into_iter()
            .next()
            .map(|s| SessionId(s.session_id))
            .ok_or_else(|| {
                warn!(target: "broker.services.video_client", "Provider returned no session");
                BrokerError::Provider("create_session: empty response".to_string())
            })
    }

    fn generate_token(&self, session_id: &SessionId) -> Result<String, BrokerError> {
        mint_publisher_token(
            &self.api_key,
            &self.api_secret,
            session_id,
            self.token_ttl_seconds,
        )
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn start_archive(
        &self,
        session_id: &SessionId,
        name: &str,
    ) -> Result<ArchiveId, BrokerError> {
        let request = self
            .client
            .post(self.project_url("archive"))
            .json(&StartArchiveRequest {
                session_id: session_id.as_str(),
                name,
            });

        let response = self.send("start_archive", request).await?;
        let archive: ProviderResource = Self::parse("start_archive", response).await?;
        Ok(ArchiveId(archive.id))
    }

    #[instrument(skip_all, fields(archive_id = %archive_id))]
    async fn stop_archive(&self, archive_id: &ArchiveId) -> Result<(), BrokerError> {
        let request = self
            .client
            .post(self.project_url(&format!("archive/{archive_id}/stop")));

        self.send("stop_archive", request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    async fn start_broadcast(
        &self,
        session_id: &SessionId,
    ) -> Result<BroadcastStarted, BrokerError> {
        let request = self
            .client
            .post(self.project_url("broadcast"))
            .json(&StartBroadcastRequest {
                session_id: session_id.as_str(),
                outputs: BroadcastOutputs { hls: HlsOutput {} },
            });

        let response = self.send("start_broadcast", request).await?;
        let broadcast: BroadcastResource = Self::parse("start_broadcast", response).await?;

        Ok(BroadcastStarted {
            id: BroadcastId(broadcast.id),
            hls_url: broadcast.broadcast_urls.and_then(|urls| urls.hls),
        })
    }

    #[instrument(skip_all, fields(broadcast_id = %broadcast_id))]
    async fn stop_broadcast(&self, broadcast_id: &BroadcastId) -> Result<(), BrokerError> {
        let request = self
            .client
            .post(self.project_url(&format!("broadcast/{broadcast_id}/stop")));

        self.send("stop_broadcast", request).await?;
        Ok(())
    }
}

/// Mock video client module for testing.
///
/// Hands out predictable ids and counts calls. Used by unit tests and by the
/// test server harness.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// API key reported by the mock.
    pub const MOCK_API_KEY: &str = "mock-api-key";

    /// Mock video client.
    pub struct MockVideoClient {
        /// Whether provider network calls fail. Token minting is local and
        /// always succeeds.
        fail: AtomicBool,
        sessions_created: AtomicUsize,
        tokens_minted: AtomicUsize,
        archives_started: AtomicUsize,
        broadcasts_started: AtomicUsize,
        /// Total provider calls, successful or not.
        call_count: AtomicUsize,
    }

    impl MockVideoClient {
        fn with_failure(fail: bool) -> Self {
            Self {
                fail: AtomicBool::new(fail),
                sessions_created: AtomicUsize::new(0),
                tokens_minted: AtomicUsize::new(0),
                archives_started: AtomicUsize::new(0),
                broadcasts_started: AtomicUsize::new(0),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Create a mock whose calls all succeed.
        pub fn accepting() -> Self {
            Self::with_failure(false)
        }

        /// Create a mock whose network calls all fail.
        pub fn failing() -> Self {
            Self::with_failure(true)
        }

        /// Switch failure mode at runtime.
        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// Total provider network calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Sessions successfully created.
        pub fn sessions_created(&self) -> usize {
            self.sessions_created.load(Ordering::SeqCst)
        }

        /// Tokens minted.
        pub fn tokens_minted(&self) -> usize {
            self.tokens_minted.load(Ordering::SeqCst)
        }

        fn check(&self, operation: &str) -> Result<(), BrokerError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(BrokerError::Provider(format!(
                    "{operation}: mock provider error"
                )));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl VideoClient for MockVideoClient {
        fn api_key(&self) -> &str {
            MOCK_API_KEY
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        async fn create_session(&self) -> Result<SessionId, BrokerError> {
            self.check("create_session")?;
            let n = self.sessions_created.fetch_add(1, Ordering::SeqCst);
            Ok(SessionId(format!("mock-session-{n}")))
        }

        fn generate_token(&self, session_id: &SessionId) -> Result<String, BrokerError> {
            let n = self.tokens_minted.fetch_add(1, Ordering::SeqCst);
            Ok(format!("T1==mock-{session_id}-{n}"))
        }

        async fn start_archive(
            &self,
            _session_id: &SessionId,
            _name: &str,
        ) -> Result<ArchiveId, BrokerError> {
            self.check("start_archive")?;
            let n = self.archives_started.fetch_add(1, Ordering::SeqCst);
            Ok(ArchiveId(format!("mock-archive-{n}")))
        }

        async fn stop_archive(&self, _archive_id: &ArchiveId) -> Result<(), BrokerError> {
            self.check("stop_archive")
        }

        async fn start_broadcast(
            &self,
            _session_id: &SessionId,
        ) -> Result<BroadcastStarted, BrokerError> {
            self.check("start_broadcast")?;
            let n = self.broadcasts_started.fetch_add(1, Ordering::SeqCst);
            Ok(BroadcastStarted {
                id: BroadcastId(format!("mock-broadcast-{n}")),
                hls_url: Some(format!("https://hls.example.test/{n}/playlist.m3u8")),
            })
        }

        async fn stop_broadcast(&self, _broadcast_id: &BroadcastId) -> Result<(), BrokerError> {
            self.check("stop_broadcast")
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> Config {
        Config::from_vars(&HashMap::from([
            ("TOKBOX_API_KEY".to_string(), "46000000".to_string()),
            ("TOKBOX_SECRET".to_string(), "project-secret".to_string()),
            (
                "VIDEO_API_URL".to_string(),
                "http://127.0.0.1:1".to_string(),
            ),
        ]))
        .unwrap()
    }

    #[test]
    fn test_auth_token_claims() {
        let client = OpenTokClient::new(&test_config()).unwrap();
        let token = client.auth_token().unwrap();

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&["46000000"]);

        let decoded = jsonwebtoken::decode::<serde_json::Value>(
            &token,
            &jsonwebtoken::DecodingKey::from_secret(b"project-secret"),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims["ist"], "project");
        assert_eq!(
            decoded.claims["exp"].as_i64().unwrap() - decoded.claims["iat"].as_i64().unwrap(),
            AUTH_JWT_TTL_SECS
        );
        assert!(decoded.claims["jti"].as_str().is_some());
    }

    #[test]
    fn test_auth_tokens_have_unique_jti() {
        let client = OpenTokClient::new(&test_config()).unwrap();
        assert_ne!(client.auth_token().unwrap(), client.auth_token().unwrap());
    }

    #[test]
    fn test_project_url() {
        let client = OpenTokClient::new(&test_config()).unwrap();
        assert_eq!(
            client.project_url("archive/abc/stop"),
            "http://127.0.0.1:1/v2/project/46000000/archive/abc/stop"
        );
    }

    #[test]
    fn test_start_broadcast_request_serialization() {
        let request = StartBroadcastRequest {
            session_id: "s-1",
            outputs: BroadcastOutputs { hls: HlsOutput {} },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"sessionId": "s-1", "outputs": {"hls": {}}}));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_provider_error() {
        let client = OpenTokClient::new(&test_config()).unwrap();
        let result = client.create_session().await;
        assert!(matches!(result, Err(BrokerError::Provider(_))));
    }
}
