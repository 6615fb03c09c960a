//! Create notification table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notification::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notification::IdempotencyKey).string().null())
                    .col(ColumnDef::new(Notification::Type).string().not_null())
                    .col(ColumnDef::new(Notification::Title).string().null())
                    .col(ColumnDef::new(Notification::Body).string().null())
                    .col(ColumnDef::new(Notification::Icon).string().null())
                    .col(ColumnDef::new(Notification::Url).string().null())
                    .col(ColumnDef::new(Notification::Locale).string().null())
                    .col(
                        ColumnDef::new(Notification::Data)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Notification::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Notification::DedupeKey).string().null())
                    .col(ColumnDef::new(Notification::TtlSeconds).integer().null())
                    .col(
                        ColumnDef::new(Notification::Priority)
                            .string()
                            .not_null()
                            .default("normal"),
                    )
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index guarantees at-most-one notification per idempotency key.
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_idempotency_key")
                    .table(Notification::Table)
                    .col(Notification::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_status")
                    .table(Notification::Table)
                    .col(Notification::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notification_dedupe_key")
                    .table(Notification::Table)
                    .col(Notification::DedupeKey)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    IdempotencyKey,
    Type,
    Title,
    Body,
    Icon,
    Url,
    Locale,
    Data,
    Status,
    DedupeKey,
    TtlSeconds,
    Priority,
    CreatedAt,
}
