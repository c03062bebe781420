//! Control messages for the broadcaster task

use tokio::sync::oneshot;

use crate::registry::RegistryError;
use crate::stats::SubscriberStats;
use crate::subscriber::{EvictionReason, SubscriberHandle};

/// Requests served by the broadcaster between dispatches
pub(crate) enum Command {
    /// Register a new subscriber and replay the current GOP to it
    Join {
        reply: oneshot::Sender<Result<SubscriberHandle, RegistryError>>,
    },
    /// Remove a subscriber; ignored if it is already gone
    Leave {
        subscriber_id: u64,
        reason: EvictionReason,
    },
    /// Snapshot per-subscriber queue statistics
    SubscriberStats {
        reply: oneshot::Sender<Vec<SubscriberStats>>,
    },
    /// Evict everyone and stop
    Close { reason: EvictionReason },
}
