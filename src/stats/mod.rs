//! Scanout and subscriber statistics

pub mod metrics;

pub use metrics::{EvictionCounts, ScanoutMetrics, ScanoutStats, SubscriberStats};
