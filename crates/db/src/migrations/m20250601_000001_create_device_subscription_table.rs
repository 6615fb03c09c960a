//! Create device_subscription table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeviceSubscription::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceSubscription::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DeviceSubscription::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceSubscription::Endpoint)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceSubscription::P256dh).string().not_null())
                    .col(ColumnDef::new(DeviceSubscription::Auth).string().not_null())
                    .col(ColumnDef::new(DeviceSubscription::DeviceId).string().null())
                    .col(ColumnDef::new(DeviceSubscription::UserAgent).string().null())
                    .col(ColumnDef::new(DeviceSubscription::Locale).string().null())
                    .col(ColumnDef::new(DeviceSubscription::Timezone).string().null())
                    .col(
                        ColumnDef::new(DeviceSubscription::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(DeviceSubscription::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DeviceSubscription::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The endpoint is the unit of identity across the whole system.
        manager
            .create_index(
                Index::create()
                    .name("idx_device_subscription_endpoint")
                    .table(DeviceSubscription::Table)
                    .col(DeviceSubscription::Endpoint)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Fan-out lookups filter on (user_id, is_active).
        manager
            .create_index(
                Index::create()
                    .name("idx_device_subscription_user_active")
                    .table(DeviceSubscription::Table)
                    .col(DeviceSubscription::UserId)
                    .col(DeviceSubscription::IsActive)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DeviceSubscription::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum DeviceSubscription {
    Table,
    Id,
    UserId,
    Endpoint,
    P256dh,
    Auth,
    DeviceId,
    UserAgent,
    Locale,
    Timezone,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
