//! Device subscription entity: one physical push endpoint of one user.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Device subscription entity for Web Push delivery.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "device_subscription")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning user (external, opaque)
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Push endpoint URL, globally unique
    #[sea_orm(column_type = "Text")]
    pub endpoint: String,

    /// P256DH public key (base64url)
    pub p256dh: String,

    /// Auth secret (base64url)
    pub auth: String,

    /// Caller-assigned device identifier
    #[sea_orm(nullable)]
    pub device_id: Option<String>,

    /// User agent of the registering browser
    #[sea_orm(nullable)]
    pub user_agent: Option<String>,

    /// Preferred locale
    #[sea_orm(nullable)]
    pub locale: Option<String>,

    /// IANA timezone
    #[sea_orm(nullable)]
    pub timezone: Option<String>,

    /// Sole truth for delivery eligibility
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Timestamp when the subscription was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the subscription was last updated
    pub updated_at: DateTimeWithTimeZone,
}

/// Relations for device subscription.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_attempt::Entity")]
    DeliveryAttempt,
}

impl Related<super::delivery_attempt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryAttempt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
