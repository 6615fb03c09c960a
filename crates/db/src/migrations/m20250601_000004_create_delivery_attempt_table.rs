//! Create delivery_attempt table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryAttempt::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeliveryAttempt::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::NotificationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeliveryAttempt::SubscriptionId).uuid().null())
                    .col(ColumnDef::new(DeliveryAttempt::UserId).string().not_null())
                    .col(ColumnDef::new(DeliveryAttempt::Status).string().not_null())
                    .col(ColumnDef::new(DeliveryAttempt::HttpStatus).integer().null())
                    .col(ColumnDef::new(DeliveryAttempt::LatencyMs).integer().null())
                    .col(ColumnDef::new(DeliveryAttempt::Error).string().null())
                    .col(
                        ColumnDef::new(DeliveryAttempt::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::Pruned)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DeliveryAttempt::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_attempt_notification")
                            .from(DeliveryAttempt::Table, DeliveryAttempt::NotificationId)
                            .to(Notification::Table, Notification::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_attempt_subscription")
                            .from(DeliveryAttempt::Table, DeliveryAttempt::SubscriptionId)
                            .to(DeviceSubscription::Table, DeviceSubscription::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_notification_id")
                    .table(DeliveryAttempt::Table)
                    .col(DeliveryAttempt::NotificationId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_subscription_id")
                    .table(DeliveryAttempt::Table)
                    .col(DeliveryAttempt::SubscriptionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_user_id")
                    .table(DeliveryAttempt::Table)
                    .col(DeliveryAttempt::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_status")
                    .table(DeliveryAttempt::Table)
                    .col(DeliveryAttempt::Status)
                    .to_owned(),
            )
            .await?;

        // Attempt listings read newest-first.
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_attempt_created_at")
                    .table(DeliveryAttempt::Table)
                    .col((DeliveryAttempt::CreatedAt, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeliveryAttempt::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum DeliveryAttempt {
    Table,
    Id,
    NotificationId,
    SubscriptionId,
    UserId,
    Status,
    HttpStatus,
    LatencyMs,
    Error,
    RetryCount,
    Pruned,
    CreatedAt,
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
}

#[derive(Iden)]
enum DeviceSubscription {
    Table,
    Id,
}
