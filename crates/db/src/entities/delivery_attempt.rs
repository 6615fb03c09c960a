//! Delivery attempt entity: one push vendor call for one
//! (notification, subscription) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery attempt ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_attempt")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Notification being delivered
    pub notification_id: Uuid,

    /// Target subscription; null once the subscription is hard-deleted
    #[sea_orm(nullable)]
    pub subscription_id: Option<Uuid>,

    /// Recipient user
    pub user_id: String,

    /// delivered | failed | skipped | pruned
    pub status: String,

    /// HTTP status from the push vendor, absent on transport errors
    #[sea_orm(nullable)]
    pub http_status: Option<i32>,

    /// Wall-clock latency of the push call
    #[sea_orm(nullable)]
    pub latency_ms: Option<i32>,

    /// Human-readable error
    #[sea_orm(nullable)]
    pub error: Option<String>,

    /// Count of prior failed attempts for this (notification, subscription)
    #[sea_orm(default_value = 0)]
    pub retry_count: i32,

    /// Whether this attempt deactivated the subscription
    #[sea_orm(default_value = false)]
    pub pruned: bool,

    /// Timestamp when the attempt was recorded
    pub created_at: DateTimeWithTimeZone,
}

/// Relations for delivery attempt.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::notification::Entity",
        from = "Column::NotificationId",
        to = "super::notification::Column::Id",
        on_delete = "Cascade"
    )]
    Notification,
    #[sea_orm(
        belongs_to = "super::device_subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::device_subscription::Column::Id",
        on_delete = "SetNull"
    )]
    DeviceSubscription,
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notification.def()
    }
}

impl Related<super::device_subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceSubscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
