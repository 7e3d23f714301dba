//! HTTP request handlers for the broker.

pub mod diagnostics;
pub mod health;
pub mod identity;
pub mod metrics;
pub mod queue;
pub mod recording;
pub mod streaming;

pub use diagnostics::server_test;
pub use health::health_check;
pub use identity::new_user;
pub use metrics::metrics_handler;
pub use queue::{enqueue, leave};
pub use recording::{start_archive, stop_archive};
pub use streaming::{start_broadcast, stop_broadcast};
