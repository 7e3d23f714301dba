//! Common utilities and types shared across Pitchroom components.

#![warn(clippy::pedantic)]

/// Module for common data types (participant ids, roles, provider handles)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
