//! HTTP API layer for pushgate.
//!
//! This crate provides the producer-facing REST API:
//!
//! - **Endpoints**: Subscriptions, notifications, health, metrics
//! - **Middleware**: HMAC request-signature verification, metrics recording
//!
//! Built on Axum 0.8 with the Tower middleware stack.

pub mod endpoints;
pub mod middleware;

pub use endpoints::router;
pub use middleware::AppState;
