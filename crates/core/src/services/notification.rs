//! Notification admission service.
//!
//! Admission is the producer-facing write path: it deduplicates on the
//! idempotency key, persists the notification and its recipients in one
//! transaction, and then fans out one delivery task per
//! (recipient × active subscription). Fan-out runs after the transaction
//! commits; enqueue failures are logged and left to the sweeper, never
//! surfaced to the producer.

use std::sync::atomic::Ordering;

use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::delivery::{DeliveryHandle, DeliveryRequest};
use pushgate_common::{AppResult, get_metrics, new_id};
use pushgate_db::entities::{delivery_attempt, notification};
use pushgate_db::repositories::{AttemptRepository, NotificationRepository, SubscriptionRepository};

/// Notification priority, driving queue selection and push urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background traffic.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Time-sensitive.
    High,
    /// Drop-everything.
    Critical,
}

impl Priority {
    /// String form persisted on the notification row.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated input for a send-notification call.
#[derive(Debug, Clone)]
pub struct SendInput {
    /// Short tag naming the kind of notification.
    pub kind: String,
    /// Recipients named by the producer.
    pub user_ids: Vec<String>,
    /// Producer-supplied idempotency token.
    pub idempotency_key: Option<String>,
    /// Display title.
    pub title: Option<String>,
    /// Display body.
    pub body: Option<String>,
    /// Icon URL.
    pub icon: Option<String>,
    /// Click-through URL.
    pub url: Option<String>,
    /// Locale hint.
    pub locale: Option<String>,
    /// Opaque producer data; must be a JSON object.
    pub data: serde_json::Value,
    /// Producer-supplied grouping token.
    pub dedupe_key: Option<String>,
    /// Push TTL in seconds.
    pub ttl_seconds: Option<i32>,
    /// Queue priority.
    pub priority: Priority,
}

/// Result of a send-notification call.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The notification row, new or replayed.
    pub notification: notification::Model,
    /// Number of recipient rows for the notification.
    pub recipient_count: u64,
    /// False when an idempotency key matched an existing notification.
    pub created: bool,
}

/// Producer-facing notification service.
#[derive(Clone)]
pub struct NotificationService {
    notifications: NotificationRepository,
    subscriptions: SubscriptionRepository,
    attempts: AttemptRepository,
    queue: DeliveryHandle,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(
        notifications: NotificationRepository,
        subscriptions: SubscriptionRepository,
        attempts: AttemptRepository,
        queue: DeliveryHandle,
    ) -> Self {
        Self {
            notifications,
            subscriptions,
            attempts,
            queue,
        }
    }

    /// Admit a notification and fan it out to every active subscription of
    /// every named recipient.
    pub async fn send(&self, input: SendInput) -> AppResult<SendOutcome> {
        let idempotency_key = input.idempotency_key.clone();

        // Idempotent replay: an existing notification is returned unchanged
        // and nothing is re-enqueued.
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.notifications.find_by_idempotency_key(key).await? {
                return self.replay(existing).await;
            }
        }

        let recipient_count = input.user_ids.len() as u64;
        let model = notification::ActiveModel {
            id: Set(new_id()),
            idempotency_key: Set(input.idempotency_key),
            kind: Set(input.kind),
            title: Set(input.title),
            body: Set(input.body),
            icon: Set(input.icon),
            url: Set(input.url),
            locale: Set(input.locale),
            data: Set(input.data),
            status: Set("pending".to_string()),
            dedupe_key: Set(input.dedupe_key),
            ttl_seconds: Set(input.ttl_seconds),
            priority: Set(input.priority.as_str().to_string()),
            created_at: Set(Utc::now().into()),
        };

        let created = match self
            .notifications
            .create_with_recipients(model, input.user_ids.clone())
            .await
        {
            Ok(created) => created,
            Err(e) => {
                // The pre-insert lookup can miss while a concurrent send
                // sharing the key commits first; the unique index rejects the
                // loser. The winner's row is this request's result.
                if let Some(key) = &idempotency_key {
                    if let Some(existing) =
                        self.notifications.find_by_idempotency_key(key).await?
                    {
                        return self.replay(existing).await;
                    }
                }
                return Err(e);
            }
        };

        get_metrics()
            .notifications_accepted
            .fetch_add(1, Ordering::Relaxed);

        // The notification is durable from here on; fan-out is best-effort.
        let enqueued = self
            .fan_out(&created, &input.user_ids, input.priority)
            .await;

        if enqueued > 0 {
            if let Err(e) = self.notifications.mark_sending(created.id).await {
                tracing::warn!(
                    notification_id = %created.id,
                    error = %e,
                    "Failed to advance notification to sending"
                );
            }
        }

        tracing::info!(
            notification_id = %created.id,
            recipients = recipient_count,
            tasks_enqueued = enqueued,
            "Admitted notification"
        );

        Ok(SendOutcome {
            notification: created,
            recipient_count,
            created: true,
        })
    }

    /// Return an existing notification as an idempotent replay.
    async fn replay(&self, existing: notification::Model) -> AppResult<SendOutcome> {
        let recipient_count = self.notifications.count_recipients(existing.id).await?;
        get_metrics()
            .notifications_replayed
            .fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            notification_id = %existing.id,
            "Replayed existing notification"
        );

        Ok(SendOutcome {
            notification: existing,
            recipient_count,
            created: false,
        })
    }

    /// Enqueue one delivery task per (recipient, active subscription).
    ///
    /// Returns the number of tasks enqueued. Failures are logged, never
    /// surfaced: the notification is already persisted and the sweeper can
    /// re-drive recipients that never got a task.
    pub async fn fan_out(
        &self,
        notification: &notification::Model,
        user_ids: &[String],
        priority: Priority,
    ) -> u64 {
        let mut enqueued = 0;

        for user_id in user_ids {
            let subscriptions = match self.subscriptions.find_active_by_user(user_id).await {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification.id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to load subscriptions for fan-out"
                    );
                    continue;
                }
            };

            for subscription in subscriptions {
                let request = DeliveryRequest {
                    notification_id: notification.id,
                    user_id: user_id.clone(),
                    subscription_id: subscription.id,
                    priority,
                };

                match self.queue.enqueue(request).await {
                    Ok(()) => {
                        enqueued += 1;
                        get_metrics().jobs_enqueued.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(
                            notification_id = %notification.id,
                            user_id = %user_id,
                            subscription_id = %subscription.id,
                            error = %e,
                            "Failed to enqueue delivery task"
                        );
                    }
                }
            }
        }

        enqueued
    }

    /// Fetch a notification with its recipient count.
    pub async fn get(&self, id: Uuid) -> AppResult<(notification::Model, u64)> {
        let notification = self.notifications.get_by_id(id).await?;
        let recipient_count = self.notifications.count_recipients(id).await?;
        Ok((notification, recipient_count))
    }

    /// List delivery attempts for a notification, newest first.
    ///
    /// An unknown id yields an empty list; attempts may legitimately not
    /// exist yet for a freshly admitted notification.
    pub async fn list_attempts(&self, id: Uuid) -> AppResult<Vec<delivery_attempt::Model>> {
        self.attempts.list_by_notification(id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::delivery::{DeliveryEnqueuer, NoOpEnqueuer};
    use async_trait::async_trait;
    use pushgate_common::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::{Arc, Mutex};

    fn notification_model(key: Option<&str>) -> notification::Model {
        notification::Model {
            id: Uuid::new_v4(),
            idempotency_key: key.map(String::from),
            kind: "t".to_string(),
            title: Some("hi".to_string()),
            body: None,
            icon: None,
            url: None,
            locale: None,
            data: serde_json::json!({}),
            status: "pending".to_string(),
            dedupe_key: None,
            ttl_seconds: Some(3600),
            priority: "normal".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn send_input(key: Option<&str>) -> SendInput {
        SendInput {
            kind: "t".to_string(),
            user_ids: vec!["u1".to_string()],
            idempotency_key: key.map(String::from),
            title: Some("hi".to_string()),
            body: None,
            icon: None,
            url: None,
            locale: None,
            data: serde_json::json!({}),
            dedupe_key: None,
            ttl_seconds: Some(3600),
            priority: Priority::Normal,
        }
    }

    fn service(db: sea_orm::DatabaseConnection, queue: DeliveryHandle) -> NotificationService {
        let db = Arc::new(db);
        NotificationService::new(
            NotificationRepository::new(Arc::clone(&db)),
            SubscriptionRepository::new(Arc::clone(&db)),
            AttemptRepository::new(db),
            queue,
        )
    }

    /// Enqueuer that records every request it sees.
    #[derive(Clone, Default)]
    struct RecordingEnqueuer {
        requests: Arc<Mutex<Vec<DeliveryRequest>>>,
        fail: bool,
    }

    #[async_trait]
    impl DeliveryEnqueuer for RecordingEnqueuer {
        async fn enqueue(&self, request: DeliveryRequest) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Queue("broker unavailable".to_string()));
            }
            self.requests.lock().unwrap().push(request);
            Ok(())
        }
    }

    fn subscription_model(user_id: &str, endpoint: &str) -> pushgate_db::entities::device_subscription::Model {
        pushgate_db::entities::device_subscription::Model {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            endpoint: endpoint.to_string(),
            p256dh: "P".to_string(),
            auth: "A".to_string(),
            device_id: None,
            user_agent: None,
            locale: None,
            timezone: None,
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_send_replays_on_idempotency_key() {
        let existing = notification_model(Some("k1"));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // idempotency lookup hits
            .append_query_results([vec![existing.clone()]])
            // recipient count
            .append_query_results([vec![maplit_count(1)]])
            .into_connection();

        let service = service(db, Arc::new(NoOpEnqueuer));
        let outcome = service.send(send_input(Some("k1"))).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.notification.id, existing.id);
        assert_eq!(outcome.recipient_count, 1);
    }

    #[tokio::test]
    async fn test_send_recovers_from_idempotency_race() {
        let existing = notification_model(Some("k1"));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // pre-insert lookup misses
            .append_query_results([Vec::<notification::Model>::new()])
            // the insert loses the race against a concurrent send
            .append_query_errors([sea_orm::DbErr::Custom(
                "duplicate key value violates unique constraint".to_string(),
            )])
            // post-conflict lookup finds the winner's row
            .append_query_results([vec![existing.clone()]])
            // recipient count
            .append_query_results([vec![maplit_count(1)]])
            .into_connection();

        let service = service(db, Arc::new(NoOpEnqueuer));
        let outcome = service.send(send_input(Some("k1"))).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.notification.id, existing.id);
        assert_eq!(outcome.recipient_count, 1);
    }

    #[tokio::test]
    async fn test_send_insert_failure_without_key_propagates() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([sea_orm::DbErr::Custom("connection reset".to_string())])
            .into_connection();

        let service = service(db, Arc::new(NoOpEnqueuer));
        let err = service.send(send_input(None)).await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_fan_out_enqueues_per_subscription() {
        let created = notification_model(None);
        let queue = RecordingEnqueuer::default();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                subscription_model("u1", "https://push.example/e1"),
                subscription_model("u1", "https://push.example/e2"),
            ]])
            .into_connection();

        let service = service(db, Arc::new(queue.clone()));
        let enqueued = service
            .fan_out(&created, &["u1".to_string()], Priority::High)
            .await;

        assert_eq!(enqueued, 2);
        let requests = queue.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.notification_id == created.id));
        assert!(requests.iter().all(|r| r.priority == Priority::High));
    }

    #[tokio::test]
    async fn test_fan_out_survives_enqueue_failure() {
        let created = notification_model(None);
        let queue = RecordingEnqueuer {
            requests: Arc::default(),
            fail: true,
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![subscription_model("u1", "https://push.example/e1")]])
            .into_connection();

        let service = service(db, Arc::new(queue));
        let enqueued = service
            .fan_out(&created, &["u1".to_string()], Priority::Normal)
            .await;

        assert_eq!(enqueued, 0);
    }

    #[test]
    fn test_priority_round_trip() {
        for priority in [
            Priority::Low,
            Priority::Normal,
            Priority::High,
            Priority::Critical,
        ] {
            assert_eq!(Priority::parse(priority.as_str()), Some(priority));
        }
        assert_eq!(Priority::parse("urgent"), None);
    }

    /// Count query result helper for `PaginatorTrait::count`.
    fn maplit_count(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        let mut row = std::collections::BTreeMap::new();
        row.insert("num_items", sea_orm::Value::BigInt(Some(n)));
        row
    }
}
