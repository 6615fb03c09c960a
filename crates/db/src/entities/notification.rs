//! Notification entity: a logical send request from a producer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification entity.
///
/// `status` is monotonic within pending → sending → (partial | sent | failed)
/// and never mutated after reaching a terminal value.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Producer-supplied idempotency token, globally unique when present
    #[sea_orm(nullable, unique)]
    pub idempotency_key: Option<String>,

    /// Short tag naming the kind of notification
    #[sea_orm(column_name = "type")]
    pub kind: String,

    /// Display title
    #[sea_orm(nullable)]
    pub title: Option<String>,

    /// Display body
    #[sea_orm(nullable)]
    pub body: Option<String>,

    /// Icon URL
    #[sea_orm(nullable)]
    pub icon: Option<String>,

    /// Click-through URL
    #[sea_orm(nullable)]
    pub url: Option<String>,

    /// Locale hint
    #[sea_orm(nullable)]
    pub locale: Option<String>,

    /// Opaque producer data, always a JSON object
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,

    /// pending | sending | partial | sent | failed
    pub status: String,

    /// Producer-supplied grouping token; persisted, not enforced at admission
    #[sea_orm(nullable)]
    pub dedupe_key: Option<String>,

    /// Push TTL in seconds (0 ..= 2_419_200)
    #[sea_orm(nullable)]
    pub ttl_seconds: Option<i32>,

    /// low | normal | high | critical
    pub priority: String,

    /// Timestamp when the notification was created
    pub created_at: DateTimeWithTimeZone,
}

/// Relations for notification.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::notification_recipient::Entity")]
    NotificationRecipient,
    #[sea_orm(has_many = "super::delivery_attempt::Entity")]
    DeliveryAttempt,
}

impl Related<super::notification_recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NotificationRecipient.def()
    }
}

impl Related<super::delivery_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryAttempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
