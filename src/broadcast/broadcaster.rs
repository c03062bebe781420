//! Per-scanout frame broadcaster
//!
//! The broadcaster is the single owner of a scanout's GOP cache and
//! subscriber set. It runs as one task that alternates between control
//! commands (join/leave/stats/close) and inbound frames, so a join's GOP
//! replay and its registration for live frames can never interleave with a
//! dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::media::{Frame, GopCache, GopUpdate};
use crate::registry::RegistryError;
use crate::stats::{ScanoutMetrics, SubscriberStats};
use crate::subscriber::{EvictionReason, SubscriberHandle, SubscriberState};

use super::command::Command;
use super::config::BroadcastConfig;

/// Broadcaster-side state for one subscriber
struct SubscriberSlot {
    /// Producer end of the outbound queue
    tx: mpsc::Sender<Frame>,
    /// Publishes state transitions to the subscriber handle
    state_tx: watch::Sender<SubscriberState>,
    /// Newest dispatched sequence at join time
    joined_at_seq: Option<u64>,
}

impl SubscriberSlot {
    fn state(&self) -> SubscriberState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SubscriberState) {
        self.state_tx.send_replace(state);
    }
}

/// Fan-out owner for a single scanout
pub struct FrameBroadcaster {
    scanout_id: Arc<str>,
    config: BroadcastConfig,
    gop: GopCache,
    subscribers: HashMap<u64, SubscriberSlot>,
    next_subscriber_id: u64,
    last_sequence: Option<u64>,
    closed: bool,
    metrics: Arc<ScanoutMetrics>,
    inbound: mpsc::Receiver<Frame>,
    commands: mpsc::Receiver<Command>,
    /// Non-owning route back to this broadcaster, handed to subscribers
    weak_commands: mpsc::WeakSender<Command>,
}

impl FrameBroadcaster {
    pub(crate) fn new(
        scanout_id: Arc<str>,
        config: BroadcastConfig,
        metrics: Arc<ScanoutMetrics>,
        inbound: mpsc::Receiver<Frame>,
        commands: mpsc::Receiver<Command>,
        weak_commands: mpsc::WeakSender<Command>,
    ) -> Self {
        Self {
            scanout_id,
            gop: GopCache::with_max_frames(config.max_gop_frames),
            config,
            subscribers: HashMap::new(),
            next_subscriber_id: 1,
            last_sequence: None,
            closed: false,
            metrics,
            inbound,
            commands,
            weak_commands,
        }
    }

    /// Scanout this broadcaster serves
    pub fn scanout_id(&self) -> &str {
        &self.scanout_id
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Frames currently held in the GOP cache
    pub fn gop_frame_count(&self) -> usize {
        self.gop.frame_count()
    }

    /// Run until the producer goes away or the scanout is closed
    pub async fn run(mut self) {
        tracing::info!(scanout = %self.scanout_id, "Broadcaster started");

        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => commands_open = false,
                },

                frame = self.inbound.recv() => match frame {
                    Some(frame) => self.dispatch(frame),
                    None => {
                        tracing::warn!(
                            scanout = %self.scanout_id,
                            subscribers = self.subscribers.len(),
                            "Producer lost"
                        );
                        self.close(EvictionReason::ProducerLost);
                        break;
                    }
                },
            }
        }

        tracing::info!(scanout = %self.scanout_id, "Broadcaster stopped");
    }

    /// Returns false when the loop should stop
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Join { reply } => {
                // A dropped reply drops the handle, which queues its own leave
                let _ = reply.send(self.join());
            }
            Command::Leave {
                subscriber_id,
                reason,
            } => {
                self.leave(subscriber_id, reason);
            }
            Command::SubscriberStats { reply } => {
                let _ = reply.send(self.subscriber_stats());
            }
            Command::Close { reason } => {
                self.close(reason);
                return false;
            }
        }
        true
    }

    /// Fan one frame out to every subscriber
    ///
    /// Never waits: a subscriber whose queue is full is evicted on the spot.
    pub fn dispatch(&mut self, frame: Frame) {
        if self.closed {
            return;
        }

        if let Some(last) = self.last_sequence {
            if frame.sequence <= last {
                self.metrics.record_out_of_order();
                tracing::debug!(
                    scanout = %self.scanout_id,
                    sequence = frame.sequence,
                    last = last,
                    "Discarding frame that does not advance the sequence"
                );
                return;
            }
        }
        self.last_sequence = Some(frame.sequence);

        match self.gop.push(&frame) {
            GopUpdate::Started => {
                tracing::trace!(
                    scanout = %self.scanout_id,
                    sequence = frame.sequence,
                    bytes = frame.size(),
                    "New GOP started"
                );
            }
            GopUpdate::Overflowed => {
                tracing::warn!(
                    scanout = %self.scanout_id,
                    sequence = frame.sequence,
                    max_frames = self.config.max_gop_frames,
                    "GOP exceeded frame cap, late joiners will wait for next keyframe"
                );
            }
            GopUpdate::Appended | GopUpdate::Skipped | GopUpdate::Stale => {}
        }
        self.metrics.set_gop(
            self.gop.frame_count(),
            self.gop.size(),
            self.gop.duration().unwrap_or(0),
        );
        self.metrics.record_dispatched(frame.is_keyframe);

        let mut evicted = Vec::new();

        for (&id, slot) in &self.subscribers {
            let joining = slot.state() == SubscriberState::Joining;

            // A joining subscriber may only start on a keyframe
            if joining && !frame.is_keyframe {
                continue;
            }

            match slot.tx.try_send(frame.clone()) {
                Ok(()) => {
                    if joining {
                        slot.set_state(SubscriberState::Streaming);
                    }
                }
                Err(TrySendError::Full(_)) => evicted.push((id, EvictionReason::SlowConsumer)),
                Err(TrySendError::Closed(_)) => evicted.push((id, EvictionReason::Left)),
            }
        }

        for (id, reason) in evicted {
            self.leave(id, reason);
        }
    }

    /// Register a new subscriber, replaying the current GOP first
    ///
    /// The replay is enqueued before the subscriber is visible to
    /// `dispatch`, so its queue starts with the cached keyframe. With no
    /// cached GOP the subscriber starts in `Joining` and receives nothing
    /// until the next live keyframe. Once the producer side is gone the
    /// scanout is closing even if the inbound end has not been drained yet.
    pub fn join(&mut self) -> Result<SubscriberHandle, RegistryError> {
        if self.closed || self.inbound.is_closed() {
            return Err(RegistryError::ScanoutClosed(self.scanout_id.to_string()));
        }

        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;

        let replay = self.gop.replay();
        let replay_len = replay.len();

        // Replay frames get their own room on top of the live headroom
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity.max(1) + replay_len);
        for frame in replay {
            // Capacity reserved above and `rx` is alive
            let _ = tx.try_send(frame);
        }

        let state = if replay_len > 0 {
            SubscriberState::Streaming
        } else {
            SubscriberState::Joining
        };
        let (state_tx, state_rx) = watch::channel(state);

        self.subscribers.insert(
            id,
            SubscriberSlot {
                tx,
                state_tx,
                joined_at_seq: self.last_sequence,
            },
        );
        self.metrics.set_subscriber_count(self.subscribers.len());

        tracing::info!(
            scanout = %self.scanout_id,
            subscriber = id,
            replay_frames = replay_len,
            subscribers = self.subscribers.len(),
            "Subscriber joined"
        );

        Ok(SubscriberHandle::new(
            id,
            Arc::clone(&self.scanout_id),
            rx,
            state_rx,
            self.weak_commands.clone(),
            self.config.write_timeout,
        ))
    }

    /// Remove a subscriber
    ///
    /// Idempotent: returns false if the subscriber was already gone.
    /// Dropping the slot closes the outbound queue, which ends the
    /// subscriber's delivery loop.
    pub fn leave(&mut self, subscriber_id: u64, reason: EvictionReason) -> bool {
        let Some(slot) = self.subscribers.remove(&subscriber_id) else {
            tracing::trace!(
                scanout = %self.scanout_id,
                subscriber = subscriber_id,
                "Leave for unknown subscriber ignored"
            );
            return false;
        };

        slot.set_state(SubscriberState::Evicted(reason));
        self.metrics.record_eviction(reason);
        self.metrics.set_subscriber_count(self.subscribers.len());

        if reason == EvictionReason::Left {
            tracing::info!(
                scanout = %self.scanout_id,
                subscriber = subscriber_id,
                subscribers = self.subscribers.len(),
                "Subscriber left"
            );
        } else {
            tracing::warn!(
                scanout = %self.scanout_id,
                subscriber = subscriber_id,
                reason = %reason,
                subscribers = self.subscribers.len(),
                "Subscriber evicted"
            );
        }

        true
    }

    /// Terminal shutdown: evict everyone, drop the GOP, refuse new joins
    pub fn close(&mut self, reason: EvictionReason) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.metrics.mark_closed();

        self.gop.clear();
        self.metrics.set_gop(0, 0, 0);

        let ids: Vec<u64> = self.subscribers.keys().copied().collect();
        for id in ids {
            self.leave(id, reason);
        }

        // Further ingest attempts see a closed queue
        self.inbound.close();

        tracing::info!(scanout = %self.scanout_id, reason = %reason, "Scanout closed");
    }

    /// Queue statistics for every registered subscriber
    pub fn subscriber_stats(&self) -> Vec<SubscriberStats> {
        let mut stats: Vec<SubscriberStats> = self
            .subscribers
            .iter()
            .map(|(&id, slot)| {
                let capacity = slot.tx.max_capacity();
                SubscriberStats {
                    subscriber_id: id,
                    state: slot.state(),
                    joined_at_seq: slot.joined_at_seq,
                    queued: capacity - slot.tx.capacity(),
                    capacity,
                }
            })
            .collect();
        stats.sort_by_key(|s| s.subscriber_id);
        stats
    }
}
