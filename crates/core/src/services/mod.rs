//! Domain services.

mod delivery;
mod notification;
mod push;
mod subscription;

pub use delivery::{DeliveryEnqueuer, DeliveryHandle, DeliveryRequest, NoOpEnqueuer};
pub use notification::{NotificationService, Priority, SendInput, SendOutcome};
pub use push::{
    PushClient, PushOutcome, PushPayload, PushRequest, Urgency, Verdict, WebPushSender, classify,
    DEFAULT_TTL_SECONDS,
};
pub use subscription::{RegisterInput, RegisterOutcome, SubscriptionService};
