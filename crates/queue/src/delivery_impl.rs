//! Redis-backed delivery queue implementation.
//!
//! This module provides the Redis-based implementation of the
//! `DeliveryEnqueuer` trait that queues jobs for the apalis delivery workers
//! to process. Priorities map onto three namespaced queues consumed with
//! weighted fair-share (see [`QueueName::weight`]).

use async_trait::async_trait;

use apalis_redis::RedisStorage;

use crate::jobs::DeliverJob;
use pushgate_common::{AppError, AppResult};
use pushgate_core::{DeliveryEnqueuer, DeliveryRequest, Priority};

/// The three delivery queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    /// `critical` and `high` priority notifications.
    High,
    /// `normal` priority notifications.
    Default,
    /// `low` priority notifications.
    Low,
}

impl QueueName {
    /// All queues, highest weight first.
    pub const ALL: [Self; 3] = [Self::High, Self::Default, Self::Low];

    /// Queue label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Default => "default",
            Self::Low => "low",
        }
    }

    /// Redis namespace for this queue's storage.
    #[must_use]
    pub fn namespace(self) -> String {
        format!("pushgate:deliver:{}", self.as_str())
    }

    /// Fair-share weight. Worker slots are split 6:3:1 across the queues.
    #[must_use]
    pub const fn weight(self) -> usize {
        match self {
            Self::High => 6,
            Self::Default => 3,
            Self::Low => 1,
        }
    }

    /// Number of worker slots for this queue given a total concurrency
    /// budget. Every queue keeps at least one slot so low-priority traffic
    /// cannot starve entirely.
    #[must_use]
    pub const fn worker_count(self, concurrency: usize) -> usize {
        let total_weight = Self::High.weight() + Self::Default.weight() + Self::Low.weight();
        let share = concurrency * self.weight() / total_weight;
        if share == 0 { 1 } else { share }
    }

    /// Queue for a notification priority.
    #[must_use]
    pub const fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::Critical | Priority::High => Self::High,
            Priority::Normal => Self::Default,
            Priority::Low => Self::Low,
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One apalis Redis storage per queue.
#[derive(Clone)]
pub struct DeliveryStorages {
    high: RedisStorage<DeliverJob>,
    default: RedisStorage<DeliverJob>,
    low: RedisStorage<DeliverJob>,
}

impl DeliveryStorages {
    /// Build the three storages on one Redis connection.
    #[must_use]
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        let storage_for = |queue: QueueName| {
            let config = apalis_redis::Config::default().set_namespace(&queue.namespace());
            RedisStorage::new_with_config(conn.clone(), config)
        };

        Self {
            high: storage_for(QueueName::High),
            default: storage_for(QueueName::Default),
            low: storage_for(QueueName::Low),
        }
    }

    /// Storage for a queue.
    #[must_use]
    pub fn get(&self, queue: QueueName) -> &RedisStorage<DeliverJob> {
        match queue {
            QueueName::High => &self.high,
            QueueName::Default => &self.default,
            QueueName::Low => &self.low,
        }
    }
}

/// Redis-backed delivery queue.
///
/// This implementation queues delivery jobs to Redis for processing by the
/// apalis delivery workers.
#[derive(Clone)]
pub struct RedisDeliveryQueue {
    storages: DeliveryStorages,
}

impl RedisDeliveryQueue {
    /// Create a new Redis delivery queue.
    #[must_use]
    pub const fn new(storages: DeliveryStorages) -> Self {
        Self { storages }
    }
}

#[async_trait]
impl DeliveryEnqueuer for RedisDeliveryQueue {
    async fn enqueue(&self, request: DeliveryRequest) -> AppResult<()> {
        use apalis::prelude::*;

        let queue = QueueName::for_priority(request.priority);
        let job = DeliverJob::new(
            request.notification_id,
            request.user_id,
            request.subscription_id,
        );

        self.storages
            .get(queue)
            .clone()
            .push(job)
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue delivery job: {e}")))?;

        tracing::debug!(
            notification_id = %request.notification_id,
            subscription_id = %request.subscription_id,
            queue = %queue,
            "Queued delivery job"
        );

        Ok(())
    }
}
