//! Notification delivery job.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job to deliver one notification to one subscription.
///
/// The payload is deliberately minimal; the worker loads the notification
/// and subscription rows at processing time, so a task never carries stale
/// content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverJob {
    /// The notification to deliver.
    pub notification_id: Uuid,

    /// The recipient user.
    pub user_id: String,

    /// The target subscription.
    pub subscription_id: Uuid,
}

impl DeliverJob {
    /// Create a new deliver job.
    #[must_use]
    pub const fn new(notification_id: Uuid, user_id: String, subscription_id: Uuid) -> Self {
        Self {
            notification_id,
            user_id,
            subscription_id,
        }
    }
}
