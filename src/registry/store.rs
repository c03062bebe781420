//! Scanout registry implementation
//!
//! Maps scanout ids to their broadcaster tasks. The table only holds control
//! handles; frames never pass through the registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::broadcast::{spawn_scanout, BroadcasterHandle};
use crate::ingest::{FrameSource, IngestReader};
use crate::stats::{ScanoutStats, SubscriberStats};
use crate::subscriber::{EvictionReason, SubscriberHandle};

use super::config::RegistryConfig;
use super::entry::{ScanoutEntry, ScanoutState};
use super::error::RegistryError;

/// Central table of all scanouts
///
/// Thread-safe via `RwLock`. Lookups for subscribe and stats take the read
/// lock only long enough to clone a handle.
pub struct ScanoutRegistry {
    scanouts: RwLock<HashMap<String, ScanoutEntry>>,
    config: RegistryConfig,
}

impl ScanoutRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            scanouts: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Open a scanout and spawn its broadcaster
    ///
    /// The caller feeds frames through the returned reader; dropping it
    /// closes the scanout. A closed scanout with the same id is replaced.
    pub async fn register(&self, scanout_id: &str) -> Result<IngestReader, RegistryError> {
        let mut scanouts = self.scanouts.write().await;
        let (reader, entry) = self.open_locked(&mut scanouts, scanout_id)?;
        scanouts.insert(scanout_id.to_string(), entry);
        Ok(reader)
    }

    /// Open a scanout and drive its ingest from `source` on a new task
    pub async fn publish<S>(
        &self,
        scanout_id: &str,
        source: S,
    ) -> Result<BroadcasterHandle, RegistryError>
    where
        S: FrameSource + 'static,
    {
        let mut scanouts = self.scanouts.write().await;
        let (reader, mut entry) = self.open_locked(&mut scanouts, scanout_id)?;

        entry.ingest = Some(tokio::spawn(reader.run(source)));
        let handle = entry.handle.clone();
        scanouts.insert(scanout_id.to_string(), entry);

        Ok(handle)
    }

    fn open_locked(
        &self,
        scanouts: &mut HashMap<String, ScanoutEntry>,
        scanout_id: &str,
    ) -> Result<(IngestReader, ScanoutEntry), RegistryError> {
        if let Some(existing) = scanouts.get(scanout_id) {
            if existing.state() == ScanoutState::Active {
                return Err(RegistryError::ScanoutAlreadyActive(scanout_id.to_string()));
            }
            tracing::debug!(scanout = %scanout_id, "Replacing closed scanout");
        }

        let (reader, handle, task) = spawn_scanout(scanout_id, self.config.broadcast.clone());

        tracing::info!(
            scanout = %scanout_id,
            outbound_capacity = self.config.broadcast.outbound_capacity,
            "Scanout registered"
        );

        Ok((reader, ScanoutEntry::new(handle, task)))
    }

    /// Control handle for a scanout
    pub async fn handle(&self, scanout_id: &str) -> Option<BroadcasterHandle> {
        let scanouts = self.scanouts.read().await;
        scanouts.get(scanout_id).map(|entry| entry.handle.clone())
    }

    /// Join a scanout as a new subscriber
    pub async fn subscribe(&self, scanout_id: &str) -> Result<SubscriberHandle, RegistryError> {
        let handle = self
            .handle(scanout_id)
            .await
            .ok_or_else(|| RegistryError::ScanoutNotFound(scanout_id.to_string()))?;

        handle.join().await
    }

    /// Remove a subscriber by id
    pub async fn unsubscribe(&self, scanout_id: &str, subscriber_id: u64) {
        if let Some(handle) = self.handle(scanout_id).await {
            handle.leave(subscriber_id).await;
        }
    }

    /// Close a scanout, evicting its subscribers with `reason`
    pub async fn close(
        &self,
        scanout_id: &str,
        reason: EvictionReason,
    ) -> Result<(), RegistryError> {
        let handle = self
            .handle(scanout_id)
            .await
            .ok_or_else(|| RegistryError::ScanoutNotFound(scanout_id.to_string()))?;

        handle.close(reason).await;
        Ok(())
    }

    /// Counters for one scanout
    pub async fn stats(&self, scanout_id: &str) -> Option<ScanoutStats> {
        let scanouts = self.scanouts.read().await;
        scanouts.get(scanout_id).map(|entry| entry.handle.stats())
    }

    /// Counters for every scanout, ordered by id
    pub async fn all_stats(&self) -> Vec<ScanoutStats> {
        let scanouts = self.scanouts.read().await;
        let mut stats: Vec<ScanoutStats> =
            scanouts.values().map(|entry| entry.handle.stats()).collect();
        stats.sort_by(|a, b| a.scanout_id.cmp(&b.scanout_id));
        stats
    }

    /// Queue statistics for each subscriber of a scanout
    pub async fn subscriber_stats(
        &self,
        scanout_id: &str,
    ) -> Result<Vec<SubscriberStats>, RegistryError> {
        let handle = self
            .handle(scanout_id)
            .await
            .ok_or_else(|| RegistryError::ScanoutNotFound(scanout_id.to_string()))?;

        Ok(handle.subscriber_stats().await)
    }

    /// Whether a scanout exists and still has its producer
    pub async fn has_active_scanout(&self, scanout_id: &str) -> bool {
        let scanouts = self.scanouts.read().await;
        scanouts
            .get(scanout_id)
            .is_some_and(|entry| entry.state() == ScanoutState::Active)
    }

    /// Total number of scanouts, closed ones included
    pub async fn scanout_count(&self) -> usize {
        self.scanouts.read().await.len()
    }

    /// Remove closed scanouts from the table
    ///
    /// Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut scanouts = self.scanouts.write().await;

        let closed: Vec<String> = scanouts
            .iter()
            .filter(|(_, entry)| entry.state() == ScanoutState::Closed)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &closed {
            if let Some(entry) = scanouts.remove(id) {
                entry.abort();
                tracing::info!(
                    scanout = %id,
                    age_secs = entry.age().as_secs(),
                    "Scanout removed by cleanup"
                );
            }
        }

        closed.len()
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }

    /// Close every scanout and empty the table
    pub async fn shutdown(&self) {
        let entries: Vec<(String, ScanoutEntry)> =
            self.scanouts.write().await.drain().collect();

        for (id, entry) in entries {
            entry.handle.close(EvictionReason::ProducerLost).await;
            entry.abort();
            tracing::debug!(scanout = %id, "Scanout shut down");
        }
    }
}

impl Default for ScanoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}
