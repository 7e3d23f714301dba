//! Observability for the broker.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
