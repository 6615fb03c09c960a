//! Background sweeps for periodic maintenance.
//!
//! Three interval tasks keep the pipeline convergent without being required
//! for correctness:
//!
//! - **Reconciliation**: re-drives notifications whose fan-out never happened
//!   (crash or enqueue failure after the admission commit).
//! - **Aggregation**: rolls attempt outcomes up into a terminal notification
//!   status once deliveries have had time to settle.
//! - **Stale pruning**: hard-deletes subscriptions that have been inactive
//!   past a retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use pushgate_common::AppResult;
use pushgate_core::{NotificationService, Priority};
use pushgate_db::repositories::{AttemptRepository, NotificationRepository, SubscriptionRepository};

/// Sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between reconciliation passes.
    pub reconcile_interval: Duration,
    /// How long a notification may sit in `pending` before it is re-driven.
    pub reconcile_grace: Duration,
    /// Interval between aggregation passes.
    pub aggregation_interval: Duration,
    /// How long a notification stays in `sending` before aggregation.
    pub aggregation_grace: Duration,
    /// Interval between stale subscription prunes.
    pub stale_prune_interval: Duration,
    /// How long an inactive subscription is retained before hard deletion.
    pub stale_window: Duration,
    /// Maximum rows touched per pass.
    pub batch_size: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(60),
            reconcile_grace: Duration::from_secs(300),
            aggregation_interval: Duration::from_secs(60),
            aggregation_grace: Duration::from_secs(600),
            stale_prune_interval: Duration::from_secs(3600),
            stale_window: Duration::from_secs(30 * 24 * 3600),
            batch_size: 100,
        }
    }
}

/// Terminal status for a notification given its attempt tallies.
///
/// Returns `None` while there is nothing to conclude from (no attempts yet).
/// Attempts that were skipped because no subscription could be reached still
/// resolve the notification: all-skipped means nothing was deliverable.
#[must_use]
pub fn terminal_status(delivered: u64, failed: u64, skipped: u64) -> Option<&'static str> {
    match (delivered, failed) {
        (0, 0) if skipped == 0 => None,
        (0, 0) => Some("failed"),
        (_, 0) => Some("sent"),
        (0, _) => Some("failed"),
        _ => Some("partial"),
    }
}

/// Periodic maintenance sweeper.
#[derive(Clone)]
pub struct Sweeper {
    notifications: NotificationRepository,
    subscriptions: SubscriptionRepository,
    attempts: AttemptRepository,
    service: NotificationService,
    config: SweeperConfig,
}

impl Sweeper {
    /// Create a new sweeper.
    #[must_use]
    pub fn new(
        notifications: NotificationRepository,
        subscriptions: SubscriptionRepository,
        attempts: AttemptRepository,
        service: NotificationService,
        config: SweeperConfig,
    ) -> Self {
        Self {
            notifications,
            subscriptions,
            attempts,
            service,
            config,
        }
    }

    /// Spawn the three sweep loops onto the runtime.
    pub fn spawn(self) {
        let reconcile = self.clone();
        let aggregate = self.clone();
        let prune = self;

        tokio::spawn(async move {
            let mut ticker = interval(reconcile.config.reconcile_interval);
            loop {
                ticker.tick().await;
                match reconcile.reconcile_once().await {
                    Ok(count) => {
                        if count > 0 {
                            info!(count, "Re-drove notifications without fan-out");
                        }
                    }
                    Err(e) => error!(error = %e, "Reconciliation sweep failed"),
                }
            }
        });

        tokio::spawn(async move {
            let mut ticker = interval(aggregate.config.aggregation_interval);
            loop {
                ticker.tick().await;
                match aggregate.aggregate_once().await {
                    Ok(count) => {
                        if count > 0 {
                            info!(count, "Aggregated notifications to terminal status");
                        }
                    }
                    Err(e) => error!(error = %e, "Aggregation sweep failed"),
                }
            }
        });

        tokio::spawn(async move {
            let mut ticker = interval(prune.config.stale_prune_interval);
            loop {
                ticker.tick().await;
                match prune.prune_stale_once().await {
                    Ok(count) => {
                        if count > 0 {
                            info!(count, "Hard-deleted stale subscriptions");
                        }
                    }
                    Err(e) => error!(error = %e, "Stale subscription prune failed"),
                }
            }
        });
    }

    /// Re-enqueue delivery tasks for notifications stuck in `pending`.
    ///
    /// Safe with an at-least-once broker: a duplicate task re-observes the
    /// subscription state and at worst records a duplicate attempt.
    pub async fn reconcile_once(&self) -> AppResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.reconcile_grace)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));

        let stuck = self
            .notifications
            .find_stuck_pending(cutoff, self.config.batch_size)
            .await?;

        let mut redriven = 0;
        for notification in stuck {
            let recipients = self.notifications.list_recipients(notification.id).await?;
            let user_ids: Vec<String> = recipients.into_iter().map(|r| r.user_id).collect();
            let priority = Priority::parse(&notification.priority).unwrap_or_default();

            let enqueued = self
                .service
                .fan_out(&notification, &user_ids, priority)
                .await;

            if enqueued > 0 {
                self.notifications.mark_sending(notification.id).await?;
                redriven += 1;
            }
        }

        Ok(redriven)
    }

    /// Roll attempt outcomes up into terminal notification statuses.
    pub async fn aggregate_once(&self) -> AppResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.aggregation_grace)
                .unwrap_or_else(|_| chrono::Duration::seconds(600));

        let candidates = self
            .notifications
            .find_for_aggregation(cutoff, self.config.batch_size)
            .await?;

        let mut aggregated = 0;
        for notification in candidates {
            let delivered = self
                .attempts
                .count_by_notification_status(notification.id, "delivered")
                .await?;
            let failed = self
                .attempts
                .count_by_notification_status(notification.id, "failed")
                .await?;
            let skipped = self
                .attempts
                .count_by_notification_status(notification.id, "skipped")
                .await?;

            if let Some(status) = terminal_status(delivered, failed, skipped) {
                let changed = self.notifications.mark_terminal(notification.id, status).await?;
                aggregated += changed;
            }
        }

        Ok(aggregated)
    }

    /// Hard-delete subscriptions inactive past the retention window.
    pub async fn prune_stale_once(&self) -> AppResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.stale_window)
                .unwrap_or_else(|_| chrono::Duration::days(30));

        let stale = self
            .subscriptions
            .find_stale(cutoff, self.config.batch_size)
            .await?;

        let mut deleted = 0;
        for subscription in stale {
            self.subscriptions.delete(subscription.id).await?;
            deleted += 1;
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_all_delivered() {
        assert_eq!(terminal_status(3, 0, 0), Some("sent"));
    }

    #[test]
    fn test_terminal_status_mixed() {
        assert_eq!(terminal_status(2, 1, 0), Some("partial"));
    }

    #[test]
    fn test_terminal_status_all_failed() {
        assert_eq!(terminal_status(0, 4, 0), Some("failed"));
    }

    #[test]
    fn test_terminal_status_all_skipped_is_failed() {
        // Every subscription was gone or inactive by delivery time; the
        // notification must still leave `sending`.
        assert_eq!(terminal_status(0, 0, 2), Some("failed"));
    }

    #[test]
    fn test_terminal_status_skipped_does_not_mask_delivery() {
        assert_eq!(terminal_status(1, 0, 3), Some("sent"));
        assert_eq!(terminal_status(1, 1, 3), Some("partial"));
    }

    #[test]
    fn test_terminal_status_no_attempts() {
        assert_eq!(terminal_status(0, 0, 0), None);
    }
}
