//! Per-scanout fan-out
//!
//! Each scanout gets one ingest reader, one broadcaster task and one
//! delivery task per subscriber, connected only by bounded queues:
//!
//! ```text
//!   producer ──► IngestReader ──try_send──► [inbound C_in] ──► FrameBroadcaster
//!                  (drop-new)                                   │  GopCache
//!                                                               │  subscribers
//!                         ┌──────────────── try_send ───────────┼──────────────┐
//!                         ▼                                     ▼              ▼
//!                   [outbound C_out]                     [outbound C_out]   ...
//!                         │                                     │
//!                   delivery loop ──► OutputSink          delivery loop ──► OutputSink
//! ```
//!
//! # Zero-Copy Design
//!
//! [`Frame`](crate::media::Frame) payloads are `bytes::Bytes`, so every
//! outbound queue holds a reference-counted view of the same allocation.

pub mod broadcaster;
pub(crate) mod command;
pub mod config;
pub mod handle;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use broadcaster::FrameBroadcaster;
pub use config::BroadcastConfig;
pub use handle::BroadcasterHandle;

use crate::ingest::IngestReader;
use crate::stats::ScanoutMetrics;

/// Wire up a new scanout
///
/// Returns the producer-side reader, the broadcaster (to be driven with
/// [`FrameBroadcaster::run`]) and a control handle.
pub fn open_scanout(
    scanout_id: impl Into<String>,
    config: BroadcastConfig,
) -> (IngestReader, FrameBroadcaster, BroadcasterHandle) {
    let scanout_id: Arc<str> = Arc::from(scanout_id.into());
    let metrics = Arc::new(ScanoutMetrics::new());

    let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
    let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));

    let reader = IngestReader::new(Arc::clone(&scanout_id), inbound_tx, Arc::clone(&metrics));
    let broadcaster = FrameBroadcaster::new(
        Arc::clone(&scanout_id),
        config,
        Arc::clone(&metrics),
        inbound_rx,
        command_rx,
        command_tx.downgrade(),
    );
    let handle = BroadcasterHandle::new(scanout_id, command_tx, metrics);

    (reader, broadcaster, handle)
}

/// Open a scanout and spawn its broadcaster task
pub fn spawn_scanout(
    scanout_id: impl Into<String>,
    config: BroadcastConfig,
) -> (IngestReader, BroadcasterHandle, tokio::task::JoinHandle<()>) {
    let (reader, broadcaster, handle) = open_scanout(scanout_id, config);
    let task = tokio::spawn(broadcaster.run());
    (reader, handle, task)
}
