//! Ingest reader
//!
//! Pulls frames from a scanout's producer and hands them to the broadcaster
//! through a small bounded queue. The enqueue never waits: when the queue is
//! full the incoming frame is dropped (drop-new), which keeps frames already
//! queued, including any keyframe boundary among them, intact.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::Result;
use crate::media::Frame;
use crate::stats::ScanoutMetrics;

use super::source::FrameSource;

/// Inbound drops between two overflow warnings
const DROP_LOG_INTERVAL: u64 = 100;

/// Warn on the first drop and every `DROP_LOG_INTERVAL`th after it
fn should_log_drop(dropped: u64) -> bool {
    dropped == 1 || dropped % DROP_LOG_INTERVAL == 0
}

/// Result of offering one frame to the inbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// Frame queued for dispatch
    Queued,
    /// Queue full, frame dropped
    Dropped,
    /// Broadcaster is gone; the scanout is closed
    Closed,
}

/// Producer end of one scanout
///
/// Dropping the reader is the terminal "producer lost" signal: the
/// broadcaster drains what is queued, then closes the scanout.
pub struct IngestReader {
    scanout_id: Arc<str>,
    inbound: mpsc::Sender<Frame>,
    metrics: Arc<ScanoutMetrics>,
}

impl IngestReader {
    pub(crate) fn new(
        scanout_id: Arc<str>,
        inbound: mpsc::Sender<Frame>,
        metrics: Arc<ScanoutMetrics>,
    ) -> Self {
        Self {
            scanout_id,
            inbound,
            metrics,
        }
    }

    /// Scanout id
    pub fn scanout_id(&self) -> &str {
        &self.scanout_id
    }

    /// Offer a frame to the broadcaster without waiting
    pub fn on_frame_received(&self, frame: Frame) -> IngestStatus {
        let size = frame.size();

        match self.inbound.try_send(frame) {
            Ok(()) => {
                self.metrics.record_received(size);
                IngestStatus::Queued
            }
            Err(TrySendError::Full(frame)) => {
                let dropped = self.metrics.record_inbound_drop();
                if should_log_drop(dropped) {
                    tracing::warn!(
                        scanout = %self.scanout_id,
                        sequence = frame.sequence,
                        keyframe = frame.is_keyframe,
                        dropped = dropped,
                        "Inbound queue full, dropping frame"
                    );
                }
                IngestStatus::Dropped
            }
            Err(TrySendError::Closed(_)) => IngestStatus::Closed,
        }
    }

    /// Frames dropped on inbound overflow so far
    pub fn dropped(&self) -> u64 {
        self.metrics.inbound_dropped()
    }

    /// Whether the broadcaster has stopped accepting frames
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }

    /// Pump frames from `source` until it ends, fails, or the scanout closes
    ///
    /// Returns the number of frames read. The reader is consumed, so the
    /// scanout closes once this returns.
    pub async fn run<S: FrameSource>(self, mut source: S) -> Result<u64> {
        tracing::info!(scanout = %self.scanout_id, "Ingest started");

        let mut frames = 0u64;

        loop {
            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!(
                        scanout = %self.scanout_id,
                        frames = frames,
                        "Producer closed stream"
                    );
                    return Ok(frames);
                }
                Err(e) => {
                    tracing::warn!(
                        scanout = %self.scanout_id,
                        frames = frames,
                        error = %e,
                        "Producer read failed"
                    );
                    return Err(e);
                }
            };

            frames += 1;
            if frames == 1 {
                tracing::debug!(
                    scanout = %self.scanout_id,
                    sequence = frame.sequence,
                    keyframe = frame.is_keyframe,
                    "First frame received"
                );
            }

            if self.on_frame_received(frame) == IngestStatus::Closed {
                tracing::info!(
                    scanout = %self.scanout_id,
                    frames = frames,
                    "Scanout closed, stopping ingest"
                );
                return Ok(frames);
            }
        }
    }
}
