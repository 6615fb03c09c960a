//! Database entities.

pub mod delivery_attempt;
pub mod device_subscription;
pub mod notification;
pub mod notification_recipient;

pub use delivery_attempt::Entity as DeliveryAttempt;
pub use device_subscription::Entity as DeviceSubscription;
pub use notification::Entity as Notification;
pub use notification_recipient::Entity as NotificationRecipient;
