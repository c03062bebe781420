//! Viewer-side subscription handle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::broadcast::command::Command;
use crate::media::Frame;

use super::delivery::{run_delivery, DeliveryReport};
use super::sink::OutputSink;
use super::state::{EvictionReason, SubscriberState};

/// One viewer's subscription to a scanout
///
/// Holds the consumer end of the outbound queue and a non-owning route back
/// to the broadcaster, used only to deregister. Dropping the handle leaves
/// the scanout.
pub struct SubscriberHandle {
    id: u64,
    scanout_id: Arc<str>,
    frames: mpsc::Receiver<Frame>,
    state: watch::Receiver<SubscriberState>,
    broadcaster: mpsc::WeakSender<Command>,
    write_timeout: Duration,
    left: bool,
}

impl SubscriberHandle {
    pub(crate) fn new(
        id: u64,
        scanout_id: Arc<str>,
        frames: mpsc::Receiver<Frame>,
        state: watch::Receiver<SubscriberState>,
        broadcaster: mpsc::WeakSender<Command>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            id,
            scanout_id,
            frames,
            state,
            broadcaster,
            write_timeout,
            left: false,
        }
    }

    /// Subscriber id, unique within the scanout
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Scanout this subscription belongs to
    pub fn scanout_id(&self) -> &str {
        &self.scanout_id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriberState {
        *self.state.borrow()
    }

    /// Frames waiting in the outbound queue
    pub fn queued(&self) -> usize {
        self.frames.len()
    }

    /// Write timeout applied by the delivery loop
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the subscriber has been evicted; frames still
    /// queued at that point are discarded.
    pub async fn recv(&mut self) -> Option<Frame> {
        if self.state().is_evicted() {
            return None;
        }
        let frame = self.frames.recv().await?;
        if self.state().is_evicted() {
            return None;
        }
        Some(frame)
    }

    /// Take the next frame if one is queued
    pub fn try_recv(&mut self) -> Option<Frame> {
        if self.state().is_evicted() {
            return None;
        }
        self.frames.try_recv().ok()
    }

    /// Leave the scanout
    ///
    /// Waits until the request is queued with the broadcaster. A no-op if
    /// the subscriber was already evicted or the scanout is gone.
    pub async fn leave(mut self) {
        self.request_leave(EvictionReason::Left).await;
    }

    /// Ask the broadcaster to drop this subscriber for `reason`
    pub(crate) async fn request_leave(&mut self, reason: EvictionReason) {
        if self.left {
            return;
        }
        self.left = true;

        if self.state().is_evicted() {
            return;
        }
        if let Some(tx) = self.broadcaster.upgrade() {
            let _ = tx
                .send(Command::Leave {
                    subscriber_id: self.id,
                    reason,
                })
                .await;
        }
    }

    /// Drain the queue into `sink` on the current task until evicted
    pub async fn deliver<S: OutputSink>(self, sink: S) -> DeliveryReport {
        run_delivery(self, sink).await
    }

    /// Spawn the delivery loop for `sink` as its own task
    pub fn spawn_delivery<S>(self, sink: S) -> JoinHandle<DeliveryReport>
    where
        S: OutputSink + 'static,
    {
        tokio::spawn(run_delivery(self, sink))
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        if self.left || self.state().is_evicted() {
            return;
        }
        // Best effort; if the control queue is full the broadcaster still
        // notices the closed outbound queue on its next dispatch.
        if let Some(tx) = self.broadcaster.upgrade() {
            let _ = tx.try_send(Command::Leave {
                subscriber_id: self.id,
                reason: EvictionReason::Left,
            });
        }
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("scanout_id", &self.scanout_id)
            .field("state", &self.state())
            .finish()
    }
}
