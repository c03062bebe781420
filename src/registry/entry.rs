//! Registry entry for one scanout

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::broadcast::BroadcasterHandle;
use crate::error::Result;

/// Lifecycle of a registered scanout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanoutState {
    /// Producer attached, accepting subscribers
    Active,
    /// Producer gone; waiting for cleanup
    Closed,
}

/// Tasks and control handle backing one scanout
pub struct ScanoutEntry {
    /// Control handle for the broadcaster task
    pub handle: BroadcasterHandle,

    /// The broadcaster task itself
    pub(super) broadcaster: JoinHandle<()>,

    /// Ingest task, when the registry drives the producer
    pub(super) ingest: Option<JoinHandle<Result<u64>>>,

    /// When the scanout was registered
    pub created_at: Instant,
}

impl ScanoutEntry {
    pub(super) fn new(handle: BroadcasterHandle, broadcaster: JoinHandle<()>) -> Self {
        Self {
            handle,
            broadcaster,
            ingest: None,
            created_at: Instant::now(),
        }
    }

    /// Current state
    pub fn state(&self) -> ScanoutState {
        if self.handle.is_closed() || self.broadcaster.is_finished() {
            ScanoutState::Closed
        } else {
            ScanoutState::Active
        }
    }

    /// Time since registration
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Stop the tasks backing this scanout
    pub(super) fn abort(&self) {
        if let Some(ref ingest) = self.ingest {
            ingest.abort();
        }
        self.broadcaster.abort();
    }
}
