//! Subscriber registry and fan-out for job lifecycle events.
//!
//! - [`BroadcastHub`] owns the set of connected subscribers and delivers
//!   each event to all of them, best effort.
//! - [`Frame`] is the transport-neutral outbound unit queued per subscriber.
//! - [`start_heartbeat`] keeps idle subscriber connections alive.

pub mod heartbeat;
pub mod hub;

pub use heartbeat::start_heartbeat;
pub use hub::{BroadcastHub, Frame, SubscriberId, Subscription};
