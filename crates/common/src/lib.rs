//! Common utilities and shared types for pushgate.

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;
pub mod signing;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::new_id;
pub use metrics::{get_metrics, Metrics, MetricsSnapshot, Timer};
pub use signing::{sign_request, timestamp_within_skew, verify_request, MAX_CLOCK_SKEW};
