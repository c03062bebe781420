//! Subscribers and delivery
//!
//! A subscriber is one viewer: a bounded outbound queue fed by the
//! broadcaster and a delivery loop that drains it into an [`OutputSink`].

pub mod delivery;
pub mod handle;
pub mod sink;
pub mod state;

pub use delivery::DeliveryReport;
pub use handle::SubscriberHandle;
pub use sink::{ChannelSink, OutputSink, WriterSink};
pub use state::{EvictionReason, SubscriberState};
