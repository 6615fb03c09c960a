//! Repositories.

mod attempt;
mod notification;
mod subscription;

pub use attempt::{AttemptRepository, AttemptStats};
pub use notification::NotificationRepository;
pub use subscription::SubscriptionRepository;
