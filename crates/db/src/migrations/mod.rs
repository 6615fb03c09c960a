//! Database migrations.

use sea_orm_migration::prelude::*;

mod m20250601_000001_create_device_subscription_table;
mod m20250601_000002_create_notification_table;
mod m20250601_000003_create_notification_recipient_table;
mod m20250601_000004_create_delivery_attempt_table;

/// Migration runner for all pushgate migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_device_subscription_table::Migration),
            Box::new(m20250601_000002_create_notification_table::Migration),
            Box::new(m20250601_000003_create_notification_recipient_table::Migration),
            Box::new(m20250601_000004_create_delivery_attempt_table::Migration),
        ]
    }
}
