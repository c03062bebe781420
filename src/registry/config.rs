//! Registry configuration

use std::time::Duration;

use crate::broadcast::BroadcastConfig;

/// Configuration for the scanout registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Fan-out settings applied to every scanout the registry opens
    pub broadcast: BroadcastConfig,

    /// How often closed scanouts are swept from the table
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast: BroadcastConfig::default(),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

impl RegistryConfig {
    /// Set the per-scanout fan-out settings
    pub fn broadcast(mut self, config: BroadcastConfig) -> Self {
        self.broadcast = config;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
