//! Subscription lifecycle service.

use std::sync::atomic::Ordering;

use chrono::Utc;
use sea_orm::Set;
use uuid::Uuid;

use pushgate_common::{AppResult, get_metrics, new_id};
use pushgate_db::entities::device_subscription;
use pushgate_db::repositories::SubscriptionRepository;

/// Input for registering a device subscription.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    /// Owning user.
    pub user_id: String,
    /// Push endpoint URL (HTTPS).
    pub endpoint: String,
    /// P256DH public key (base64url).
    pub p256dh: String,
    /// Auth secret (base64url).
    pub auth: String,
    /// Caller-assigned device identifier.
    pub device_id: Option<String>,
    /// Registering browser's user agent.
    pub user_agent: Option<String>,
    /// Preferred locale.
    pub locale: Option<String>,
    /// IANA timezone.
    pub timezone: Option<String>,
}

/// Result of a register call.
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    /// The subscription row, new or pre-existing.
    pub subscription: device_subscription::Model,
    /// Whether a new row was inserted.
    pub created: bool,
}

/// Service for registering and unregistering device subscriptions.
#[derive(Clone)]
pub struct SubscriptionService {
    repo: SubscriptionRepository,
}

impl SubscriptionService {
    /// Create a new subscription service.
    #[must_use]
    pub const fn new(repo: SubscriptionRepository) -> Self {
        Self { repo }
    }

    /// Register a device subscription, idempotent on the endpoint.
    ///
    /// A known endpoint returns the existing row unchanged, regardless of the
    /// user or keys in the request: the endpoint is the unit of identity.
    pub async fn register(&self, input: RegisterInput) -> AppResult<RegisterOutcome> {
        if let Some(existing) = self.repo.find_by_endpoint(&input.endpoint).await? {
            tracing::debug!(
                subscription_id = %existing.id,
                "Register hit an existing endpoint"
            );
            return Ok(RegisterOutcome {
                subscription: existing,
                created: false,
            });
        }

        let now = Utc::now();
        let subscription = device_subscription::ActiveModel {
            id: Set(new_id()),
            user_id: Set(input.user_id),
            endpoint: Set(input.endpoint),
            p256dh: Set(input.p256dh),
            auth: Set(input.auth),
            device_id: Set(input.device_id),
            user_agent: Set(input.user_agent),
            locale: Set(input.locale),
            timezone: Set(input.timezone),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = self.repo.create(subscription).await?;
        get_metrics()
            .subscriptions_registered
            .fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            subscription_id = %created.id,
            user_id = %created.user_id,
            "Registered device subscription"
        );

        Ok(RegisterOutcome {
            subscription: created,
            created: true,
        })
    }

    /// Unregister a subscription (soft delete).
    ///
    /// Returns `NotFound` when the id is unknown.
    pub async fn unregister(&self, id: Uuid) -> AppResult<()> {
        let deactivated = self.repo.deactivate(id).await?;
        get_metrics()
            .subscriptions_deactivated
            .fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            subscription_id = %deactivated.id,
            user_id = %deactivated.user_id,
            "Unregistered device subscription"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn sample(endpoint: &str) -> device_subscription::Model {
        device_subscription::Model {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
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

    fn input(endpoint: &str) -> RegisterInput {
        RegisterInput {
            user_id: "u1".to_string(),
            endpoint: endpoint.to_string(),
            p256dh: "P".to_string(),
            auth: "A".to_string(),
            device_id: None,
            user_agent: None,
            locale: None,
            timezone: None,
        }
    }

    #[tokio::test]
    async fn test_register_returns_existing_row() {
        let existing = sample("https://push.example/e1");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();

        let service = SubscriptionService::new(SubscriptionRepository::new(Arc::new(db)));
        let outcome = service.register(input("https://push.example/e1")).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.subscription.id, existing.id);
        assert!(outcome.subscription.is_active);
    }

    #[tokio::test]
    async fn test_register_existing_ignores_new_user() {
        // The endpoint is the unit of identity: a different user_id in the
        // request still gets the original row back.
        let existing = sample("https://push.example/e1");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();

        let service = SubscriptionService::new(SubscriptionRepository::new(Arc::new(db)));
        let mut request = input("https://push.example/e1");
        request.user_id = "someone-else".to_string();

        let outcome = service.register(request).await.unwrap();

        assert_eq!(outcome.subscription.user_id, "u1");
    }

    #[tokio::test]
    async fn test_register_inserts_when_endpoint_unknown() {
        let created = sample("https://push.example/e2");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // endpoint lookup misses
            .append_query_results([Vec::<device_subscription::Model>::new()])
            // insert returns the new row
            .append_query_results([vec![created.clone()]])
            .into_connection();

        let service = SubscriptionService::new(SubscriptionRepository::new(Arc::new(db)));
        let outcome = service.register(input("https://push.example/e2")).await.unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.subscription.endpoint, "https://push.example/e2");
    }

    #[tokio::test]
    async fn test_unregister_unknown_id_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<device_subscription::Model>::new()])
            .into_connection();

        let service = SubscriptionService::new(SubscriptionRepository::new(Arc::new(db)));
        let err = service.unregister(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, pushgate_common::AppError::NotFound(_)));
    }
}
