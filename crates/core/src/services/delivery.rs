//! Delivery task enqueueing.
//!
//! Provides an abstraction for queueing per-subscription delivery tasks.
//! The actual implementation is provided by the queue crate.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::notification::Priority;
use pushgate_common::AppResult;

/// One delivery task to enqueue: a (notification, recipient, subscription)
/// triple plus the scheduling hints carried by the notification.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// The notification to deliver.
    pub notification_id: Uuid,
    /// The recipient user.
    pub user_id: String,
    /// The target subscription.
    pub subscription_id: Uuid,
    /// Queue selection.
    pub priority: Priority,
}

/// Trait for enqueueing delivery tasks.
///
/// This allows admission to queue tasks without directly depending on the
/// broker implementation.
#[async_trait]
pub trait DeliveryEnqueuer: Send + Sync {
    /// Enqueue one delivery task at the request's priority.
    async fn enqueue(&self, request: DeliveryRequest) -> AppResult<()>;
}

/// Shared handle to the delivery enqueuer.
pub type DeliveryHandle = Arc<dyn DeliveryEnqueuer>;

/// A no-op implementation for tests and tooling.
#[derive(Clone, Default)]
pub struct NoOpEnqueuer;

#[async_trait]
impl DeliveryEnqueuer for NoOpEnqueuer {
    async fn enqueue(&self, _request: DeliveryRequest) -> AppResult<()> {
        Ok(())
    }
}
