//! # Broker Test Utilities
//!
//! Shared test utilities for the matchmaking broker.
//!
//! This crate provides:
//! - Server test harness (`TestBrokerServer` for E2E tests) backed by the
//!   mock video provider
//!
//! ## Usage
//!
//! ```rust,ignore
//! use broker_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestBrokerServer::spawn().await?;
//!
//!     let investor = server.new_user().await?;
//!     let queued = server.enqueue(&investor).await?;
//!     assert_eq!(queued.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

pub use server_harness::*;
