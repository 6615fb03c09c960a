//! Create notification_recipient table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationRecipient::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationRecipient::NotificationId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationRecipient::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NotificationRecipient::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(NotificationRecipient::NotificationId)
                            .col(NotificationRecipient::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_recipient_notification")
                            .from(
                                NotificationRecipient::Table,
                                NotificationRecipient::NotificationId,
                            )
                            .to(Notification::Table, Notification::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(NotificationRecipient::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum NotificationRecipient {
    Table,
    NotificationId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
}
