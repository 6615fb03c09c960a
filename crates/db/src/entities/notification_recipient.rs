//! Notification recipient entity: a (notification, user) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One recipient of a notification, independent of how many active
/// subscriptions that user holds.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_recipient")]
pub struct Model {
    /// Parent notification
    #[sea_orm(primary_key, auto_increment = false)]
    pub notification_id: Uuid,

    /// Recipient user (external, opaque)
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    /// Timestamp when the recipient row was created
    pub created_at: DateTimeWithTimeZone,
}

/// Relations for notification recipient.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::notification::Entity",
        from = "Column::NotificationId",
        to = "super::notification::Column::Id",
        on_delete = "Cascade"
    )]
    Notification,
}

impl Related<super::notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notification.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
