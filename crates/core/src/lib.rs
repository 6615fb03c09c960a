//! Core business logic for pushgate.
//!
//! This crate contains the domain services for the delivery pipeline:
//!
//! - **Subscription lifecycle**: Registration and soft deletion of device
//!   subscriptions, idempotent on the push endpoint
//! - **Admission**: Idempotent acceptance of notifications and durable
//!   fan-out into per-subscription delivery tasks
//! - **Push client**: The Web Push protocol call and its outcome
//!   classification
//! - **Delivery enqueuer**: The broker abstraction consumed by admission
//!
//! All services are designed for dependency injection and support both real
//! database connections and mock implementations for testing.

pub mod services;

pub use services::*;
