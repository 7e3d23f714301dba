//! Pitchroom matchmaking broker library.
//!
//! Pairs "investor" and "idea" participants one-to-one, never pairing the
//! same two twice, and hands both sides credentials for a shared session on
//! the video provider.
//!
//! Exposed as a library so the test harness can spawn the router in-process.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
