//! Background delivery queue for pushgate.

pub mod delivery_impl;
pub mod jobs;
pub mod retry;
pub mod sweeper;
pub mod workers;

pub use delivery_impl::{DeliveryStorages, QueueName, RedisDeliveryQueue};
pub use jobs::DeliverJob;
pub use retry::{DeadLetterEntry, RetryConfig};
pub use sweeper::{Sweeper, SweeperConfig};
pub use workers::{DeliverContext, deliver_worker};
