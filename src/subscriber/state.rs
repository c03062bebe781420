//! Subscriber state machine
//!
//! ```text
//! Joining ──(first keyframe enqueued)──► Streaming ──► Evicted(reason)
//!    │                                                     ▲
//!    └─────────────────────────────────────────────────────┘
//! ```
//!
//! `Evicted` is terminal. A viewer that wants to resume must join again and
//! receives a fresh GOP replay.

use std::fmt;

/// Why a subscriber was removed from its scanout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// Outbound queue filled up; the viewer cannot keep pace
    SlowConsumer,
    /// Writing to the output sink failed or timed out
    WriteFailed,
    /// The scanout's producer went away
    ProducerLost,
    /// The viewer left (explicit unsubscribe or dropped handle)
    Left,
}

impl EvictionReason {
    /// Stable lowercase name for logs and stats
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::SlowConsumer => "slow_consumer",
            EvictionReason::WriteFailed => "write_failed",
            EvictionReason::ProducerLost => "producer_lost",
            EvictionReason::Left => "left",
        }
    }
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Registered, waiting for a keyframe before any frame is delivered
    Joining,
    /// Receiving frames, starting from a keyframe
    Streaming,
    /// Removed from the scanout (terminal)
    Evicted(EvictionReason),
}

impl SubscriberState {
    /// Whether the subscriber has been removed
    pub fn is_evicted(&self) -> bool {
        matches!(self, SubscriberState::Evicted(_))
    }

    /// Eviction reason, if evicted
    pub fn eviction_reason(&self) -> Option<EvictionReason> {
        match self {
            SubscriberState::Evicted(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriberState::Joining => f.write_str("joining"),
            SubscriberState::Streaming => f.write_str("streaming"),
            SubscriberState::Evicted(reason) => write!(f, "evicted({})", reason),
        }
    }
}
