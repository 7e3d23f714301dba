//! Service layer for the broker.
//!
//! # Components
//!
//! - `identity_issuer` - participant ids with alternating roles
//! - `match_registry` - waiting queues, session table and pairing history
//! - `session_broker` - provider sessions, tokens, archives and broadcasts
//! - `matchmaking` - composes the three into the public operations
//! - `video_client` - REST client for the video provider
//! - `provider_token` - locally signed participant tokens

pub mod identity_issuer;
pub mod match_registry;
pub mod matchmaking;
pub mod provider_token;
pub mod session_broker;
pub mod video_client;

pub use matchmaking::{MatchOutcome, MatchmakingService, QueueStatus, RegistrySnapshot};
pub use video_client::{OpenTokClient, VideoClient};
