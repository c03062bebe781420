//! Cloneable control handle for a running broadcaster

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::registry::RegistryError;
use crate::stats::{ScanoutMetrics, ScanoutStats, SubscriberStats};
use crate::subscriber::{EvictionReason, SubscriberHandle};

use super::command::Command;

/// Talks to a [`FrameBroadcaster`](super::FrameBroadcaster) task
///
/// All requests travel over the broadcaster's bounded control queue and are
/// served between frame dispatches.
#[derive(Clone)]
pub struct BroadcasterHandle {
    scanout_id: Arc<str>,
    commands: mpsc::Sender<Command>,
    metrics: Arc<ScanoutMetrics>,
}

impl BroadcasterHandle {
    pub(crate) fn new(
        scanout_id: Arc<str>,
        commands: mpsc::Sender<Command>,
        metrics: Arc<ScanoutMetrics>,
    ) -> Self {
        Self {
            scanout_id,
            commands,
            metrics,
        }
    }

    /// Scanout id
    pub fn scanout_id(&self) -> &str {
        &self.scanout_id
    }

    /// Subscribe a new viewer
    ///
    /// The returned handle's queue starts with the GOP active at join time.
    pub async fn join(&self) -> Result<SubscriberHandle, RegistryError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Join { reply })
            .await
            .map_err(|_| self.closed_error())?;

        rx.await.map_err(|_| self.closed_error())?
    }

    /// Remove a subscriber by id (idempotent)
    pub async fn leave(&self, subscriber_id: u64) {
        let _ = self
            .commands
            .send(Command::Leave {
                subscriber_id,
                reason: EvictionReason::Left,
            })
            .await;
    }

    /// Close the scanout, evicting every subscriber with `reason`
    pub async fn close(&self, reason: EvictionReason) {
        let _ = self.commands.send(Command::Close { reason }).await;
    }

    /// Per-subscriber queue statistics, empty once the scanout is closed
    pub async fn subscriber_stats(&self) -> Vec<SubscriberStats> {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(Command::SubscriberStats { reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Scanout counters
    pub fn stats(&self) -> ScanoutStats {
        self.metrics.snapshot(&self.scanout_id)
    }

    /// Whether the producer is gone
    pub fn is_closed(&self) -> bool {
        self.metrics.is_closed() || self.commands.is_closed()
    }

    /// Current subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.metrics.subscriber_count()
    }

    fn closed_error(&self) -> RegistryError {
        RegistryError::ScanoutClosed(self.scanout_id.to_string())
    }
}

impl std::fmt::Debug for BroadcasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcasterHandle")
            .field("scanout_id", &self.scanout_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
