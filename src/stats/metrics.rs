//! Statistics and metrics for scanouts and subscribers
//!
//! Counters are updated with relaxed atomics from the ingest and broadcaster
//! tasks and read lock-free by anyone holding the scanout's metrics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::subscriber::{EvictionReason, SubscriberState};

/// Live counters for one scanout
#[derive(Debug)]
pub struct ScanoutMetrics {
    started_at: Instant,
    frames_received: AtomicU64,
    inbound_dropped: AtomicU64,
    frames_dispatched: AtomicU64,
    out_of_order: AtomicU64,
    keyframes: AtomicU64,
    bytes_received: AtomicU64,
    subscribers: AtomicU64,
    gop_frames: AtomicU64,
    gop_bytes: AtomicU64,
    gop_duration: AtomicU64,
    evicted_slow: AtomicU64,
    evicted_write: AtomicU64,
    evicted_producer: AtomicU64,
    left: AtomicU64,
    closed: AtomicBool,
}

impl ScanoutMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_received: AtomicU64::new(0),
            inbound_dropped: AtomicU64::new(0),
            frames_dispatched: AtomicU64::new(0),
            out_of_order: AtomicU64::new(0),
            keyframes: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            subscribers: AtomicU64::new(0),
            gop_frames: AtomicU64::new(0),
            gop_bytes: AtomicU64::new(0),
            gop_duration: AtomicU64::new(0),
            evicted_slow: AtomicU64::new(0),
            evicted_write: AtomicU64::new(0),
            evicted_producer: AtomicU64::new(0),
            left: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Frame accepted into the inbound queue
    pub fn record_received(&self, size: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(size as u64, Ordering::Relaxed);
    }

    /// Frame dropped because the inbound queue was full
    ///
    /// Returns the drop count including this one.
    pub fn record_inbound_drop(&self) -> u64 {
        self.inbound_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Frame fanned out by the broadcaster
    pub fn record_dispatched(&self, is_keyframe: bool) {
        self.frames_dispatched.fetch_add(1, Ordering::Relaxed);
        if is_keyframe {
            self.keyframes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Frame discarded because its sequence did not advance
    pub fn record_out_of_order(&self) {
        self.out_of_order.fetch_add(1, Ordering::Relaxed);
    }

    /// Subscriber removed for `reason`
    pub fn record_eviction(&self, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::SlowConsumer => &self.evicted_slow,
            EvictionReason::WriteFailed => &self.evicted_write,
            EvictionReason::ProducerLost => &self.evicted_producer,
            EvictionReason::Left => &self.left,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_subscriber_count(&self, count: usize) {
        self.subscribers.store(count as u64, Ordering::Relaxed);
    }

    /// Current GOP cache size and timestamp span
    pub fn set_gop(&self, frames: usize, bytes: usize, duration: u64) {
        self.gop_frames.store(frames as u64, Ordering::Relaxed);
        self.gop_bytes.store(bytes as u64, Ordering::Relaxed);
        self.gop_duration.store(duration, Ordering::Relaxed);
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn inbound_dropped(&self) -> u64 {
        self.inbound_dropped.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed) as usize
    }

    pub fn gop_frames(&self) -> usize {
        self.gop_frames.load(Ordering::Relaxed) as usize
    }

    /// Take a consistent-enough snapshot for reporting
    pub fn snapshot(&self, scanout_id: &str) -> ScanoutStats {
        ScanoutStats {
            scanout_id: scanout_id.to_string(),
            closed: self.is_closed(),
            uptime: self.started_at.elapsed(),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            out_of_order: self.out_of_order.load(Ordering::Relaxed),
            keyframes: self.keyframes.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            subscriber_count: self.subscriber_count(),
            gop_frames: self.gop_frames(),
            gop_bytes: self.gop_bytes.load(Ordering::Relaxed) as usize,
            gop_duration: self.gop_duration.load(Ordering::Relaxed),
            evictions: EvictionCounts {
                slow_consumer: self.evicted_slow.load(Ordering::Relaxed),
                write_failed: self.evicted_write.load(Ordering::Relaxed),
                producer_lost: self.evicted_producer.load(Ordering::Relaxed),
                left: self.left.load(Ordering::Relaxed),
            },
        }
    }
}

impl Default for ScanoutMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber removals by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionCounts {
    pub slow_consumer: u64,
    pub write_failed: u64,
    pub producer_lost: u64,
    pub left: u64,
}

impl EvictionCounts {
    /// Forced removals (everything except voluntary leaves)
    pub fn forced(&self) -> u64 {
        self.slow_consumer + self.write_failed + self.producer_lost
    }

    pub fn get(&self, reason: EvictionReason) -> u64 {
        match reason {
            EvictionReason::SlowConsumer => self.slow_consumer,
            EvictionReason::WriteFailed => self.write_failed,
            EvictionReason::ProducerLost => self.producer_lost,
            EvictionReason::Left => self.left,
        }
    }
}

/// Point-in-time statistics for one scanout
#[derive(Debug, Clone)]
pub struct ScanoutStats {
    /// Scanout id
    pub scanout_id: String,
    /// Whether the producer is gone
    pub closed: bool,
    /// Time since the scanout was registered
    pub uptime: Duration,
    /// Frames accepted into the inbound queue
    pub frames_received: u64,
    /// Frames dropped on inbound overflow
    pub inbound_dropped: u64,
    /// Frames fanned out to subscribers
    pub frames_dispatched: u64,
    /// Frames discarded for not advancing the sequence
    pub out_of_order: u64,
    /// Keyframes dispatched
    pub keyframes: u64,
    /// Payload bytes accepted
    pub bytes_received: u64,
    /// Current subscriber count
    pub subscriber_count: usize,
    /// Frames in the GOP cache
    pub gop_frames: usize,
    /// Payload bytes in the GOP cache
    pub gop_bytes: usize,
    /// Timestamp span from the cached keyframe to the newest cached frame
    pub gop_duration: u64,
    /// Subscriber removals by reason
    pub evictions: EvictionCounts,
}

impl ScanoutStats {
    /// Average inbound bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

/// Outbound queue statistics for one subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberStats {
    /// Subscriber id
    pub subscriber_id: u64,
    /// Current state
    pub state: SubscriberState,
    /// Newest dispatched sequence when the subscriber joined
    pub joined_at_seq: Option<u64>,
    /// Frames waiting in the outbound queue
    pub queued: usize,
    /// Outbound queue capacity
    pub capacity: usize,
}

impl SubscriberStats {
    /// Queue fill level, 0-100
    pub fn fill_percent(&self) -> u8 {
        if self.capacity == 0 {
            return 0;
        }
        ((self.queued * 100) / self.capacity).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = ScanoutMetrics::new();
        let stats = metrics.snapshot("display-0");

        assert_eq!(stats.scanout_id, "display-0");
        assert!(!stats.closed);
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.inbound_dropped, 0);
        assert_eq!(stats.subscriber_count, 0);
        assert_eq!(stats.evictions, EvictionCounts::default());
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = ScanoutMetrics::new();

        metrics.record_received(100);
        metrics.record_received(50);
        assert_eq!(metrics.record_inbound_drop(), 1);
        assert_eq!(metrics.record_inbound_drop(), 2);
        metrics.record_dispatched(true);
        metrics.record_dispatched(false);
        metrics.record_out_of_order();
        metrics.set_subscriber_count(3);
        metrics.set_gop(2, 150, 33_334);

        let stats = metrics.snapshot("s");
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 150);
        assert_eq!(stats.inbound_dropped, 2);
        assert_eq!(stats.frames_dispatched, 2);
        assert_eq!(stats.keyframes, 1);
        assert_eq!(stats.out_of_order, 1);
        assert_eq!(stats.subscriber_count, 3);
        assert_eq!(stats.gop_frames, 2);
        assert_eq!(stats.gop_bytes, 150);
        assert_eq!(stats.gop_duration, 33_334);
    }

    #[test]
    fn test_eviction_counts() {
        let metrics = ScanoutMetrics::new();

        metrics.record_eviction(EvictionReason::SlowConsumer);
        metrics.record_eviction(EvictionReason::SlowConsumer);
        metrics.record_eviction(EvictionReason::WriteFailed);
        metrics.record_eviction(EvictionReason::Left);

        let counts = metrics.snapshot("s").evictions;
        assert_eq!(counts.get(EvictionReason::SlowConsumer), 2);
        assert_eq!(counts.get(EvictionReason::WriteFailed), 1);
        assert_eq!(counts.get(EvictionReason::ProducerLost), 0);
        assert_eq!(counts.forced(), 3);
    }

    #[test]
    fn test_closed_flag() {
        let metrics = ScanoutMetrics::new();
        assert!(!metrics.is_closed());

        metrics.mark_closed();
        assert!(metrics.is_closed());
        assert!(metrics.snapshot("s").closed);
    }

    #[test]
    fn test_bitrate_zero_uptime() {
        let stats = ScanoutMetrics::new().snapshot("s");
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_subscriber_fill_percent() {
        let stats = SubscriberStats {
            subscriber_id: 1,
            state: SubscriberState::Streaming,
            joined_at_seq: Some(10),
            queued: 30,
            capacity: 120,
        };
        assert_eq!(stats.fill_percent(), 25);

        let empty = SubscriberStats {
            capacity: 0,
            ..stats
        };
        assert_eq!(empty.fill_percent(), 0);
    }
}
