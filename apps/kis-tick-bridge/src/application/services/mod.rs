//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SubscriptionService`: the control boundary callers subscribe through
//! - `TickForwarder`: drains accepted ticks into the downstream sink

mod forwarding;
mod subscriptions;

pub use forwarding::{DEFAULT_FORWARD_QUEUE_CAPACITY, TickForwarder, forward_queue};
pub use subscriptions::SubscriptionService;
