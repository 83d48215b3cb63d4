//! Notification fan-out.
//!
//! Responsibility: deliver job snapshots from the single producer (the job
//! tracker) to any number of independent consumers (toasts, history panel, ...)
//! without either side knowing about the other.
//!
//! Consumers either register a callback ([`NotificationBridge::subscribe`]) or
//! pull from a channel ([`NotificationBridge::subscribe_channel`]).

pub mod bridge;
pub mod bus;

pub use bridge::{NotificationBridge, Subscription};
pub use bus::ChannelSubscription;
