//! Client token minting for the video provider.
//!
//! Tokens are signed locally with the project secret; no network call is
//! made. Format:
//!
//! ```text
//! "T1==" + base64("partner_id=<key>&sig=<hex hmac-sha1>:<data>")
//! data = session_id=..&create_time=..&nonce=..&role=publisher&expire_time=..
//! ```

use crate::errors::BrokerError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::secret::{ExposeSecret, SecretString};
use common::types::SessionId;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::error;

const TOKEN_SENTINEL: &str = "T1==";

/// Participants always publish their own camera.
const PUBLISHER_ROLE: &str = "publisher";

/// Mint a publisher token for `session_id` valid for `ttl_seconds`.
///
/// # Errors
///
/// Returns `BrokerError::Internal` if the system RNG fails.
pub fn mint_publisher_token(
    api_key: &str,
    api_secret: &SecretString,
    session_id: &SessionId,
    ttl_seconds: u64,
) -> Result<String, BrokerError> {
    let create_time = chrono::Utc::now().timestamp();
    let ttl = i64::try_from(ttl_seconds).map_err(|_| BrokerError::Internal)?;

    Ok(encode_token(
        api_key,
        api_secret,
        session_id,
        create_time,
        create_time.saturating_add(ttl),
        random_nonce()?,
    ))
}

fn random_nonce() -> Result<u32, BrokerError> {
    let mut bytes = [0u8; 4];
    SystemRandom::new().fill(&mut bytes).map_err(|_| {
        error!(target: "broker.services.provider_token", "System RNG failed");
        BrokerError::Internal
    })?;
    Ok(u32::from_be_bytes(bytes))
}

fn encode_token(
    api_key: &str,
    api_secret: &SecretString,
    session_id: &SessionId,
    create_time: i64,
    expire_time: i64,
    nonce: u32,
) -> String {
    let data = format!(
        "session_id={session_id}&create_time={create_time}&nonce={nonce}&role={PUBLISHER_ROLE}&expire_time={expire_time}"
    );

    let key = hmac::Key::new(
        hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        api_secret.expose_secret().as_bytes(),
    );
    let sig = hex::encode(hmac::sign(&key, data.as_bytes()).as_ref());

    let decoded = format!("partner_id={api_key}&sig={sig}:{data}");
    format!("{TOKEN_SENTINEL}{}", STANDARD.encode(decoded))
}
