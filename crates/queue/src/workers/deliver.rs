//! Delivery worker.
//!
//! Consumes `DeliverJob`s, loads the notification and subscription, performs
//! the push call, records the attempt, and deactivates subscriptions on
//! terminal vendor verdicts. Only 5xx and transport failures are returned to
//! the broker for retry; everything else is acknowledged so the task is not
//! re-invoked.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use apalis::prelude::*;
use chrono::Utc;
use sea_orm::Set;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::jobs::DeliverJob;
use crate::retry::{DeadLetterEntry, RetryConfig};
use pushgate_common::{get_metrics, new_id};
use pushgate_core::{
    DEFAULT_TTL_SECONDS, Priority, PushClient, PushPayload, PushRequest, Urgency, Verdict, classify,
};
use pushgate_db::entities::delivery_attempt;
use pushgate_db::repositories::{AttemptRepository, NotificationRepository, SubscriptionRepository};

/// Context for the delivery workers.
#[derive(Clone)]
pub struct DeliverContext {
    /// Subscription store access.
    pub subscriptions: SubscriptionRepository,
    /// Notification store access.
    pub notifications: NotificationRepository,
    /// Attempt ledger access.
    pub attempts: AttemptRepository,
    /// The push vendor client.
    pub push_client: Arc<dyn PushClient>,
    /// Retry policy shared with the broker registration.
    pub retry: RetryConfig,
}

/// What to tell the broker about a processed task.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    /// Acknowledge; the task is done and must not be re-invoked.
    Ack,
    /// Report failure so the broker retries.
    Retry(String),
}

/// Worker function for delivering notifications.
///
/// # Errors
/// Returns an error only for retryable failures (5xx or transport), which
/// triggers the broker's bounded retry.
pub async fn deliver_worker(
    job: DeliverJob,
    ctx: Data<DeliverContext>,
    attempt: Attempt,
) -> Result<(), Error> {
    // Attempt counts executions (1-based); retry_count counts prior failures.
    let retry_count = attempt.current().saturating_sub(1) as u32;

    info!(
        notification_id = %job.notification_id,
        user_id = %job.user_id,
        subscription_id = %job.subscription_id,
        retry_count,
        "Processing notification delivery"
    );

    match process_delivery(&job, &ctx, retry_count).await {
        Disposition::Ack => {
            get_metrics().jobs_completed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        Disposition::Retry(message) => {
            get_metrics().jobs_failed.fetch_add(1, Ordering::Relaxed);

            if !ctx.retry.should_retry(retry_count + 1) {
                let entry =
                    DeadLetterEntry::new(job.clone(), retry_count + 1, message.clone());
                error!(
                    notification_id = %entry.job.notification_id,
                    subscription_id = %entry.job.subscription_id,
                    attempts = entry.attempts,
                    last_error = %entry.last_error,
                    failed_at = %entry.failed_at,
                    "Delivery exhausted retries, dead-lettering"
                );
            } else {
                // Backoff before the broker re-invokes the task.
                tokio::time::sleep(ctx.retry.jittered_delay_for_attempt(retry_count)).await;
            }

            let boxed: Box<dyn std::error::Error + Send + Sync> = message.into();
            Err(Error::Failed(boxed.into()))
        }
    }
}

async fn process_delivery(job: &DeliverJob, ctx: &DeliverContext, retry_count: u32) -> Disposition {
    // Step 1: the target subscription. Store failures are transient; a
    // missing or inactive subscription terminates the task without a push.
    let subscription = match ctx.subscriptions.find_by_id(job.subscription_id).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => {
            warn!(
                subscription_id = %job.subscription_id,
                "Subscription gone before delivery, skipping"
            );
            get_metrics().deliveries_skipped.fetch_add(1, Ordering::Relaxed);
            record_attempt(
                ctx,
                job,
                AttemptRecord {
                    subscription_id: None,
                    status: "skipped",
                    error: Some("subscription no longer exists".to_string()),
                    retry_count,
                    ..AttemptRecord::default()
                },
            )
            .await;
            return Disposition::Ack;
        }
        Err(e) => return Disposition::Retry(format!("failed to load subscription: {e}")),
    };

    if !subscription.is_active {
        get_metrics().deliveries_skipped.fetch_add(1, Ordering::Relaxed);
        record_attempt(
            ctx,
            job,
            AttemptRecord {
                subscription_id: Some(subscription.id),
                status: "skipped",
                error: Some("subscription is not active".to_string()),
                retry_count,
                pruned: true,
                ..AttemptRecord::default()
            },
        )
        .await;
        return Disposition::Ack;
    }

    // Step 2: the notification. A missing notification is non-retryable.
    let notification = match ctx.notifications.find_by_id(job.notification_id).await {
        Ok(Some(notification)) => notification,
        Ok(None) => {
            warn!(
                notification_id = %job.notification_id,
                "Notification gone before delivery"
            );
            record_attempt(
                ctx,
                job,
                AttemptRecord {
                    subscription_id: Some(subscription.id),
                    status: "failed",
                    error: Some("notification no longer exists".to_string()),
                    retry_count,
                    ..AttemptRecord::default()
                },
            )
            .await;
            return Disposition::Ack;
        }
        Err(e) => return Disposition::Retry(format!("failed to load notification: {e}")),
    };

    // Step 3: the push call.
    let payload = match PushPayload::from_notification(&notification).to_bytes() {
        Ok(payload) => payload,
        Err(e) => {
            record_attempt(
                ctx,
                job,
                AttemptRecord {
                    subscription_id: Some(subscription.id),
                    status: "failed",
                    error: Some(format!("failed to build payload: {e}")),
                    retry_count,
                    ..AttemptRecord::default()
                },
            )
            .await;
            return Disposition::Ack;
        }
    };

    let ttl_seconds = notification
        .ttl_seconds
        .and_then(|ttl| u32::try_from(ttl).ok())
        .unwrap_or(DEFAULT_TTL_SECONDS);
    let priority = Priority::parse(&notification.priority).unwrap_or_default();

    let request = PushRequest {
        endpoint: subscription.endpoint.clone(),
        p256dh: subscription.p256dh.clone(),
        auth: subscription.auth.clone(),
        ttl_seconds,
        urgency: Urgency::from(priority),
        payload,
    };

    let outcome = match ctx.push_client.send(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Local permanent failure (bad key material); retrying cannot help.
            record_attempt(
                ctx,
                job,
                AttemptRecord {
                    subscription_id: Some(subscription.id),
                    status: "failed",
                    error: Some(e.to_string()),
                    retry_count,
                    ..AttemptRecord::default()
                },
            )
            .await;
            return Disposition::Ack;
        }
    };

    // Steps 4-6: classify, record, side-effect.
    let verdict = classify(&outcome);
    let latency_ms = i32::try_from(outcome.elapsed.as_millis()).ok();
    let error = match (verdict, outcome.http_status) {
        (Verdict::Delivered, _) => None,
        (Verdict::Pruned, Some(410)) => Some("subscription gone (410)".to_string()),
        (Verdict::Pruned, _) => Some("subscription not found (404)".to_string()),
        (Verdict::PermanentFailure, Some(status)) => Some(format!("client error: {status}")),
        (Verdict::RetryableFailure, Some(status)) => Some(format!("server error: {status}")),
        (_, None) => outcome.error.clone(),
    };

    get_metrics().record_push(verdict == Verdict::Delivered, outcome.elapsed);

    record_attempt(
        ctx,
        job,
        AttemptRecord {
            subscription_id: Some(subscription.id),
            status: verdict.attempt_status(),
            http_status: outcome.http_status,
            latency_ms,
            error: error.clone(),
            retry_count,
            pruned: verdict.prunes_subscription(),
        },
    )
    .await;

    if verdict.prunes_subscription() {
        info!(
            subscription_id = %subscription.id,
            http_status = ?outcome.http_status,
            "Deactivating subscription on terminal vendor verdict"
        );
        get_metrics().deliveries_pruned.fetch_add(1, Ordering::Relaxed);
        get_metrics()
            .subscriptions_deactivated
            .fetch_add(1, Ordering::Relaxed);

        if let Err(e) = ctx.subscriptions.deactivate(subscription.id).await {
            // The next task for this subscription re-observes the verdict.
            error!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to deactivate subscription"
            );
        }
    }

    if verdict.is_retryable() {
        Disposition::Retry(error.unwrap_or_else(|| "delivery failed".to_string()))
    } else {
        Disposition::Ack
    }
}

/// Fields of one attempt row; everything not set stays at its default.
#[derive(Debug, Default)]
struct AttemptRecord {
    subscription_id: Option<Uuid>,
    status: &'static str,
    http_status: Option<u16>,
    latency_ms: Option<i32>,
    error: Option<String>,
    retry_count: u32,
    pruned: bool,
}

/// Best-effort attempt write.
///
/// A failed write is logged, never retried: re-running the push to repair
/// the ledger would duplicate the delivery.
async fn record_attempt(ctx: &DeliverContext, job: &DeliverJob, record: AttemptRecord) {
    let attempt = delivery_attempt::ActiveModel {
        id: Set(new_id()),
        notification_id: Set(job.notification_id),
        subscription_id: Set(record.subscription_id),
        user_id: Set(job.user_id.clone()),
        status: Set(record.status.to_string()),
        http_status: Set(record.http_status.map(i32::from)),
        latency_ms: Set(record.latency_ms),
        error: Set(record.error),
        retry_count: Set(record.retry_count as i32),
        pruned: Set(record.pruned),
        created_at: Set(Utc::now().into()),
    };

    if let Err(e) = ctx.attempts.create(attempt).await {
        error!(
            notification_id = %job.notification_id,
            subscription_id = %job.subscription_id,
            error = %e,
            "Failed to record delivery attempt"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pushgate_common::{AppError, AppResult};
    use pushgate_core::PushOutcome;
    use pushgate_db::entities::{device_subscription, notification};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Push client that replays scripted outcomes and counts calls.
    #[derive(Default)]
    struct MockPushClient {
        responses: Mutex<VecDeque<AppResult<PushOutcome>>>,
        calls: AtomicUsize,
    }

    impl MockPushClient {
        fn with_status(status: u16) -> Self {
            let client = Self::default();
            client.push_response(Ok(PushOutcome {
                http_status: Some(status),
                error: None,
                elapsed: Duration::from_millis(12),
            }));
            client
        }

        fn push_response(&self, response: AppResult<PushOutcome>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PushClient for MockPushClient {
        async fn send(&self, _request: PushRequest) -> AppResult<PushOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Push("mock exhausted".to_string())))
        }
    }

    fn subscription(active: bool) -> device_subscription::Model {
        device_subscription::Model {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            endpoint: "https://push.example/e1".to_string(),
            p256dh: "P".to_string(),
            auth: "A".to_string(),
            device_id: None,
            user_agent: None,
            locale: None,
            timezone: None,
            is_active: active,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn notification() -> notification::Model {
        notification::Model {
            id: Uuid::new_v4(),
            idempotency_key: None,
            kind: "t".to_string(),
            title: Some("hi".to_string()),
            body: None,
            icon: None,
            url: None,
            locale: None,
            data: serde_json::json!({}),
            status: "sending".to_string(),
            dedupe_key: None,
            ttl_seconds: Some(3600),
            priority: "normal".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn attempt_row(status: &str) -> delivery_attempt::Model {
        delivery_attempt::Model {
            id: Uuid::new_v4(),
            notification_id: Uuid::new_v4(),
            subscription_id: None,
            user_id: "u1".to_string(),
            status: status.to_string(),
            http_status: None,
            latency_ms: None,
            error: None,
            retry_count: 0,
            pruned: false,
            created_at: Utc::now().into(),
        }
    }

    fn context(db: DatabaseConnection, push_client: Arc<dyn PushClient>) -> DeliverContext {
        let db = Arc::new(db);
        DeliverContext {
            subscriptions: SubscriptionRepository::new(Arc::clone(&db)),
            notifications: NotificationRepository::new(Arc::clone(&db)),
            attempts: AttemptRepository::new(db),
            push_client,
            retry: RetryConfig {
                initial_delay: Duration::ZERO,
                jitter: 0.0,
                ..RetryConfig::default()
            },
        }
    }

    fn job_for(sub: &device_subscription::Model, notif: &notification::Model) -> DeliverJob {
        DeliverJob::new(notif.id, "u1".to_string(), sub.id)
    }

    #[tokio::test]
    async fn test_inactive_subscription_skips_without_push() {
        let sub = subscription(false);
        let notif = notification();
        let push = Arc::new(MockPushClient::default());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // subscription load
            .append_query_results([vec![sub.clone()]])
            // attempt insert
            .append_query_results([vec![attempt_row("skipped")]])
            .into_connection();

        let ctx = context(db, push.clone());
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(disposition, Disposition::Ack);
        // No network call is made for an inactive subscription.
        assert_eq!(push.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_subscription_skips() {
        let sub = subscription(true);
        let notif = notification();
        let push = Arc::new(MockPushClient::default());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<device_subscription::Model>::new()])
            .append_query_results([vec![attempt_row("skipped")]])
            .into_connection();

        let ctx = context(db, push.clone());
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(push.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delivered_on_2xx() {
        let sub = subscription(true);
        let notif = notification();
        let push = Arc::new(MockPushClient::with_status(201));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub.clone()]])
            .append_query_results([vec![notif.clone()]])
            .append_query_results([vec![attempt_row("delivered")]])
            .into_connection();

        let ctx = context(db, push.clone());
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(push.call_count(), 1);
    }

    #[tokio::test]
    async fn test_410_prunes_and_acks() {
        let sub = subscription(true);
        let mut deactivated = sub.clone();
        deactivated.is_active = false;
        let notif = notification();
        let push = Arc::new(MockPushClient::with_status(410));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // subscription load
            .append_query_results([vec![sub.clone()]])
            // notification load
            .append_query_results([vec![notif.clone()]])
            // attempt insert
            .append_query_results([vec![attempt_row("failed")]])
            // deactivate: get_by_id, then update
            .append_query_results([vec![sub.clone()]])
            .append_query_results([vec![deactivated]])
            .into_connection();

        let ctx = context(db, push);
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        // Terminal verdicts never retry.
        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_permanent_4xx_acks_without_prune() {
        let sub = subscription(true);
        let notif = notification();
        let push = Arc::new(MockPushClient::with_status(400));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub.clone()]])
            .append_query_results([vec![notif.clone()]])
            .append_query_results([vec![attempt_row("failed")]])
            .into_connection();

        let ctx = context(db, push);
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(disposition, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_5xx_requests_retry() {
        let sub = subscription(true);
        let notif = notification();
        let push = Arc::new(MockPushClient::with_status(503));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub.clone()]])
            .append_query_results([vec![notif.clone()]])
            .append_query_results([vec![attempt_row("failed")]])
            .into_connection();

        let ctx = context(db, push);
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(
            disposition,
            Disposition::Retry("server error: 503".to_string())
        );
    }

    #[tokio::test]
    async fn test_transport_error_requests_retry() {
        let sub = subscription(true);
        let notif = notification();
        let push = Arc::new(MockPushClient::default());
        push.push_response(Ok(PushOutcome {
            http_status: None,
            error: Some("push request timed out".to_string()),
            elapsed: Duration::from_secs(30),
        }));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub.clone()]])
            .append_query_results([vec![notif.clone()]])
            .append_query_results([vec![attempt_row("failed")]])
            .into_connection();

        let ctx = context(db, push);
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(
            disposition,
            Disposition::Retry("push request timed out".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_notification_is_non_retryable() {
        let sub = subscription(true);
        let notif = notification();
        let push = Arc::new(MockPushClient::default());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub.clone()]])
            .append_query_results([Vec::<notification::Model>::new()])
            .append_query_results([vec![attempt_row("failed")]])
            .into_connection();

        let ctx = context(db, push.clone());
        let disposition = process_delivery(&job_for(&sub, &notif), &ctx, 0).await;

        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(push.call_count(), 0);
    }
}
