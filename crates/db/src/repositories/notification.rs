//! Notification repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, SqlErr, TransactionError, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::{notification, notification_recipient};
use pushgate_common::{AppError, AppResult};

/// Repository for notification operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<notification::Model>> {
        notification::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a notification by ID or return an error.
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<notification::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {id} not found")))
    }

    /// Find a notification by its idempotency key.
    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> AppResult<Option<notification::Model>> {
        notification::Entity::find()
            .filter(notification::Column::IdempotencyKey.eq(key))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find notifications sharing a dedupe key created since `since`.
    ///
    /// Persisted for producers to group near-duplicate sends; admission does
    /// not consult it.
    pub async fn find_by_dedupe_key(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<notification::Model>> {
        notification::Entity::find()
            .filter(notification::Column::DedupeKey.eq(key))
            .filter(notification::Column::CreatedAt.gte(since))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically insert a notification and all of its recipient rows.
    ///
    /// This is the single transactional boundary of the admission path: either
    /// the notification and every recipient land, or nothing does. A
    /// unique-constraint violation (two concurrent sends sharing an
    /// idempotency key) surfaces as `Conflict` so the caller can fall back to
    /// the winner's row.
    pub async fn create_with_recipients(
        &self,
        model: notification::ActiveModel,
        user_ids: Vec<String>,
    ) -> AppResult<notification::Model> {
        let created = self
            .db
            .transaction::<_, notification::Model, sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    let created = model.insert(txn).await?;

                    let now = Utc::now();
                    let recipients: Vec<notification_recipient::ActiveModel> = user_ids
                        .into_iter()
                        .map(|user_id| notification_recipient::ActiveModel {
                            notification_id: Set(created.id),
                            user_id: Set(user_id),
                            created_at: Set(now.into()),
                        })
                        .collect();

                    notification_recipient::Entity::insert_many(recipients)
                        .exec_without_returning(txn)
                        .await?;

                    Ok(created)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Transaction(e) => match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(message)) => {
                        AppError::Conflict(message)
                    }
                    _ => AppError::Database(e.to_string()),
                },
                TransactionError::Connection(e) => AppError::Database(e.to_string()),
            })?;

        Ok(created)
    }

    /// List recipients of a notification.
    pub async fn list_recipients(
        &self,
        notification_id: Uuid,
    ) -> AppResult<Vec<notification_recipient::Model>> {
        notification_recipient::Entity::find()
            .filter(notification_recipient::Column::NotificationId.eq(notification_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count recipients of a notification.
    pub async fn count_recipients(&self, notification_id: Uuid) -> AppResult<u64> {
        notification_recipient::Entity::find()
            .filter(notification_recipient::Column::NotificationId.eq(notification_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Advance a pending notification to `sending`.
    ///
    /// The status filter keeps the transition monotonic: a notification that
    /// already moved on is left untouched.
    pub async fn mark_sending(&self, id: Uuid) -> AppResult<()> {
        notification::Entity::update_many()
            .col_expr(notification::Column::Status, Expr::value("sending"))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::Status.eq("pending"))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Move a `sending` notification to a terminal status.
    ///
    /// Returns how many rows changed (0 when the notification already reached
    /// a terminal status).
    pub async fn mark_terminal(&self, id: Uuid, status: &str) -> AppResult<u64> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::Status, Expr::value(status))
            .filter(notification::Column::Id.eq(id))
            .filter(notification::Column::Status.eq("sending"))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Notifications still `pending` that were created before `cutoff`.
    ///
    /// These either never got their fan-out (crash between commit and
    /// enqueue) or their enqueues all failed; the sweeper re-drives them.
    pub async fn find_stuck_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        notification::Entity::find()
            .filter(notification::Column::Status.eq("pending"))
            .filter(notification::Column::CreatedAt.lt(cutoff))
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Notifications in `sending` created before `cutoff`, due for terminal
    /// status aggregation.
    pub async fn find_for_aggregation(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        notification::Entity::find()
            .filter(notification::Column::Status.eq("sending"))
            .filter(notification::Column::CreatedAt.lt(cutoff))
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn sample() -> notification::Model {
        notification::Model {
            id: Uuid::new_v4(),
            idempotency_key: Some("k1".to_string()),
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

    #[tokio::test]
    async fn test_find_by_idempotency_key_hit() {
        let model = sample();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model.clone()]])
            .into_connection();

        let repo = NotificationRepository::new(Arc::new(db));
        let found = repo.find_by_idempotency_key("k1").await.unwrap();

        assert_eq!(found, Some(model));
    }

    #[tokio::test]
    async fn test_find_by_idempotency_key_miss() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notification::Model>::new()])
            .into_connection();

        let repo = NotificationRepository::new(Arc::new(db));
        let found = repo.find_by_idempotency_key("absent").await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_by_dedupe_key_window() {
        let mut model = sample();
        model.dedupe_key = Some("weekly-digest".to_string());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![model.clone()]])
            .into_connection();

        let repo = NotificationRepository::new(Arc::new(db));
        let found = repo
            .find_by_dedupe_key("weekly-digest", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(found, vec![model]);
    }

    #[tokio::test]
    async fn test_mark_sending_is_filtered_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let repo = NotificationRepository::new(Arc::new(db));
        repo.mark_sending(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_terminal_reports_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let repo = NotificationRepository::new(Arc::new(db));
        let rows = repo.mark_terminal(Uuid::new_v4(), "sent").await.unwrap();

        assert_eq!(rows, 0);
    }
}
