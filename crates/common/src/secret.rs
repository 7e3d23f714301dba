//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. The broker holds
//! exactly one long-lived secret, the video provider's project secret, which
//! signs both REST authentication JWTs and participant session tokens.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that contains one is safe to log via `{:?}` or tracing fields.
//! The value is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct ProviderCredentials {
//!     api_key: String,
//!     api_secret: SecretString,
//! }
//!
//! let creds = ProviderCredentials {
//!     api_key: "46000000".to_string(),
//!     api_secret: SecretString::from("0123456789abcdef"),
//! };
//!
//! // Redacted
//! println!("{:?}", creds);
//!
//! // Signing code must ask for the value explicitly
//! let secret: &str = creds.api_secret.expose_secret();
//! assert_eq!(secret.len(), 16);
//! ```

pub use secrecy::{ExposeSecret, SecretString};
