//! Job workers.

mod deliver;

pub use deliver::{DeliverContext, deliver_worker};
