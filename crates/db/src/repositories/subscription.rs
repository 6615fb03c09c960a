//! Device subscription repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::device_subscription::{ActiveModel, Column, Entity, Model};
use pushgate_common::{AppError, AppResult};

/// Repository for device subscription operations.
#[derive(Clone)]
pub struct SubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a subscription by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a subscription by ID or return an error.
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Subscription {id} not found")))
    }

    /// Find a subscription by its endpoint URL.
    ///
    /// The endpoint is globally unique, so at most one row matches.
    pub async fn find_by_endpoint(&self, endpoint: &str) -> AppResult<Option<Model>> {
        Entity::find()
            .filter(Column::Endpoint.eq(endpoint))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all active subscriptions for a user, newest first.
    pub async fn find_active_by_user(&self, user_id: &str) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsActive.eq(true))
            .order_by_desc(Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count active subscriptions for a user.
    pub async fn count_active_by_user(&self, user_id: &str) -> AppResult<u64> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsActive.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new subscription.
    pub async fn create(&self, subscription: ActiveModel) -> AppResult<Model> {
        subscription
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a subscription.
    pub async fn update(&self, subscription: ActiveModel) -> AppResult<Model> {
        subscription
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Deactivate a subscription (soft delete).
    ///
    /// Idempotent: deactivating an already-inactive subscription is a no-op
    /// apart from touching `updated_at`.
    pub async fn deactivate(&self, id: Uuid) -> AppResult<Model> {
        let subscription = self.get_by_id(id).await?;
        let mut active: ActiveModel = subscription.into();

        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());

        self.update(active).await
    }

    /// Find inactive subscriptions not updated since `cutoff`.
    ///
    /// Candidates for hard deletion by the sweeper.
    pub async fn find_stale(&self, cutoff: DateTime<Utc>, limit: u64) -> AppResult<Vec<Model>> {
        use sea_orm::QuerySelect;

        Entity::find()
            .filter(Column::IsActive.eq(false))
            .filter(Column::UpdatedAt.lt(cutoff))
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Hard-delete a subscription. Attempts referencing it are set-null.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sample(active: bool) -> Model {
        Model {
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

    #[tokio::test]
    async fn test_find_by_endpoint_hit() {
        let model = sample(true);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model.clone()]])
            .into_connection();

        let repo = SubscriptionRepository::new(Arc::new(db));
        let found = repo
            .find_by_endpoint("https://push.example/e1")
            .await
            .unwrap();

        assert_eq!(found, Some(model));
    }

    #[tokio::test]
    async fn test_find_by_endpoint_miss() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Model>::new()])
            .into_connection();

        let repo = SubscriptionRepository::new(Arc::new(db));
        let found = repo.find_by_endpoint("https://push.example/nope").await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Model>::new()])
            .into_connection();

        let repo = SubscriptionRepository::new(Arc::new(db));
        let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_count_active_by_user() {
        let mut count_row = std::collections::BTreeMap::new();
        count_row.insert("num_items", sea_orm::Value::BigInt(Some(2)));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row]])
            .into_connection();

        let repo = SubscriptionRepository::new(Arc::new(db));
        let count = repo.count_active_by_user("u1").await.unwrap();

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_deactivate_flips_flag() {
        let model = sample(true);
        let mut deactivated = model.clone();
        deactivated.is_active = false;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model]])
            .append_query_results([vec![deactivated.clone()]])
            .into_connection();

        let repo = SubscriptionRepository::new(Arc::new(db));
        let result = repo.deactivate(deactivated.id).await.unwrap();

        assert!(!result.is_active);
    }
}
