//! Broadcaster configuration

use std::time::Duration;

use crate::media::gop::DEFAULT_MAX_GOP_FRAMES;

/// Queue depths and timeouts for one scanout's fan-out
///
/// The inbound queue absorbs encoder bursts; the per-subscriber outbound
/// queue absorbs network jitter and is expected to be much deeper.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Inbound queue depth between the ingest reader and the broadcaster
    pub inbound_capacity: usize,

    /// Live-frame headroom in each subscriber's outbound queue
    pub outbound_capacity: usize,

    /// Maximum frames held in the GOP cache before it is discarded
    pub max_gop_frames: usize,

    /// A sink write taking longer than this evicts the subscriber
    pub write_timeout: Duration,

    /// Depth of the join/leave control queue
    pub command_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 32,
            outbound_capacity: 480,
            max_gop_frames: DEFAULT_MAX_GOP_FRAMES,
            write_timeout: Duration::from_secs(5),
            command_capacity: 64,
        }
    }
}

impl BroadcastConfig {
    /// Set the inbound queue depth (minimum 1)
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }

    /// Set the outbound queue depth (minimum 1)
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the GOP cache frame cap (minimum 1)
    pub fn max_gop_frames(mut self, frames: usize) -> Self {
        self.max_gop_frames = frames.max(1);
        self
    }

    /// Set the sink write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the control queue depth (minimum 1)
    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }
}
