//! Delivery attempt repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::entities::delivery_attempt::{ActiveModel, Column, Entity, Model};
use pushgate_common::{AppError, AppResult};

/// Aggregate delivery statistics for a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptStats {
    /// Total attempts in the window.
    pub total: u64,
    /// Attempts with status `delivered`.
    pub delivered: u64,
    /// Attempts with status `failed`.
    pub failed: u64,
    /// Mean push latency in milliseconds, if any attempt carried one.
    pub mean_latency_ms: Option<f64>,
}

/// Repository for the delivery attempt ledger.
#[derive(Clone)]
pub struct AttemptRepository {
    db: Arc<DatabaseConnection>,
}

impl AttemptRepository {
    /// Create a new attempt repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Record a delivery attempt.
    pub async fn create(&self, attempt: ActiveModel) -> AppResult<Model> {
        attempt
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List attempts for a notification, newest first.
    pub async fn list_by_notification(&self, notification_id: Uuid) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::NotificationId.eq(notification_id))
            .order_by_desc(Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count attempts for a notification with a given status.
    pub async fn count_by_notification_status(
        &self,
        notification_id: Uuid,
        status: &str,
    ) -> AppResult<u64> {
        Entity::find()
            .filter(Column::NotificationId.eq(notification_id))
            .filter(Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Aggregate statistics for attempts recorded since `since`.
    pub async fn stats_since(&self, since: DateTime<Utc>) -> AppResult<AttemptStats> {
        let total = Entity::find()
            .filter(Column::CreatedAt.gte(since))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let delivered = Entity::find()
            .filter(Column::CreatedAt.gte(since))
            .filter(Column::Status.eq("delivered"))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let failed = Entity::find()
            .filter(Column::CreatedAt.gte(since))
            .filter(Column::Status.eq("failed"))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mean_latency_ms: Option<f64> = Entity::find()
            .select_only()
            .column_as(
                Expr::expr(Func::avg(
                    Expr::col(Column::LatencyMs).cast_as(Alias::new("double precision")),
                )),
                "mean_latency_ms",
            )
            .filter(Column::CreatedAt.gte(since))
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .flatten();

        Ok(AttemptStats {
            total,
            delivered,
            failed,
            mean_latency_ms,
        })
    }
}
