//! End-to-end fan-out behaviour through the public API

use std::io;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

use scanout_fanout::broadcast::{open_scanout, spawn_scanout};
use scanout_fanout::{
    BroadcastConfig, BroadcasterHandle, ChannelSink, EvictionReason, Frame, FrameBroadcaster,
    IngestReader, IngestStatus, OutputSink, RegistryConfig, RegistryError, ScanoutRegistry,
    SubscriberHandle, SubscriberState,
};

const WAIT: Duration = Duration::from_secs(5);

/// Keyframe every `gop` frames, starting at sequence 1
fn frame(sequence: u64, gop: u64) -> Frame {
    let timestamp = sequence * 16_667;
    if (sequence - 1) % gop == 0 {
        Frame::keyframe(sequence, timestamp, Bytes::from_static(b"keyframe"))
    } else {
        Frame::delta(sequence, timestamp, Bytes::from_static(b"delta"))
    }
}

fn sequences(frames: &[Frame]) -> Vec<u64> {
    frames.iter().map(|f| f.sequence).collect()
}

fn assert_gop_start_and_order(frames: &[Frame]) {
    assert!(!frames.is_empty());
    assert!(frames[0].is_keyframe, "first frame must be a keyframe");
    for pair in frames.windows(2) {
        assert!(
            pair[0].sequence < pair[1].sequence,
            "sequence went {} -> {}",
            pair[0].sequence,
            pair[1].sequence
        );
    }
}

fn drain(sub: &mut SubscriberHandle) -> Vec<Frame> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}

async fn wait_dispatched(handle: &BroadcasterHandle, count: u64) {
    let deadline = Instant::now() + WAIT;
    loop {
        let stats = handle.stats();
        if stats.frames_dispatched + stats.out_of_order >= count {
            return;
        }
        assert!(Instant::now() < deadline, "broadcaster stalled");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn recv_n(sub: &mut SubscriberHandle, n: usize) -> Vec<Frame> {
    let mut frames = Vec::with_capacity(n);
    while frames.len() < n {
        let frame = tokio::time::timeout(WAIT, sub.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("subscriber ended early");
        frames.push(frame);
    }
    frames
}

/// Keeps the producer side connected alongside the broadcaster
fn sync_broadcaster(config: BroadcastConfig) -> (IngestReader, FrameBroadcaster) {
    let (reader, broadcaster, _handle) = open_scanout("display-0", config);
    (reader, broadcaster)
}

/// Never finishes a write
struct StalledSink;

impl OutputSink for StalledSink {
    async fn write(&mut self, _frame: &Frame) -> io::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_late_joiner_starts_at_current_gop() {
    let config = BroadcastConfig::default().inbound_capacity(512);
    let (reader, handle, _task) = spawn_scanout("display-0", config);

    for seq in 1..=45 {
        assert_eq!(reader.on_frame_received(frame(seq, 30)), IngestStatus::Queued);
    }
    wait_dispatched(&handle, 45).await;

    let mut sub = handle.join().await.unwrap();
    assert_eq!(sub.state(), SubscriberState::Streaming);

    for seq in 46..=50 {
        reader.on_frame_received(frame(seq, 30));
    }

    let frames = recv_n(&mut sub, 20).await;
    assert_eq!(sequences(&frames), (31..=50).collect::<Vec<_>>());
    assert_gop_start_and_order(&frames);
    assert!(frames[..15].iter().all(|f| f.is_replay));
    assert!(frames[15..].iter().all(|f| !f.is_replay));
}

#[tokio::test]
async fn test_slow_viewer_evicted_others_unaffected() {
    let config = BroadcastConfig::default()
        .inbound_capacity(512)
        .outbound_capacity(120)
        .write_timeout(Duration::from_secs(60));
    let (reader, handle, _task) = spawn_scanout("display-0", config);

    let slow = handle.join().await.unwrap();
    let stalled = handle.join().await.unwrap().spawn_delivery(StalledSink);
    let mut fast = handle.join().await.unwrap();

    let mut received = Vec::new();
    for seq in 1..=200 {
        reader.on_frame_received(frame(seq, 60));
        if seq % 20 == 0 {
            wait_dispatched(&handle, seq).await;
            received.extend(drain(&mut fast));
        }
    }
    wait_dispatched(&handle, 200).await;
    received.extend(drain(&mut fast));

    assert_eq!(
        slow.state(),
        SubscriberState::Evicted(EvictionReason::SlowConsumer)
    );
    assert_eq!(fast.state(), SubscriberState::Streaming);
    assert_eq!(sequences(&received), (1..=200).collect::<Vec<_>>());
    assert_gop_start_and_order(&received);

    let stats = handle.stats();
    assert_eq!(stats.evictions.slow_consumer, 2);
    assert_eq!(stats.subscriber_count, 1);
    assert_eq!(stats.frames_dispatched, 200);

    let remaining = handle.subscriber_stats().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].subscriber_id, fast.id());

    stalled.abort();
}

#[tokio::test]
async fn test_producer_loss_evicts_everyone() {
    let registry = ScanoutRegistry::with_config(
        RegistryConfig::default().broadcast(BroadcastConfig::default().inbound_capacity(64)),
    );
    let reader = registry.register("display-0").await.unwrap();

    let mut deliveries = Vec::new();
    let mut consumers = Vec::new();
    for _ in 0..3 {
        let sub = registry.subscribe("display-0").await.unwrap();
        let (tx, rx) = mpsc::channel(64);
        deliveries.push(sub.spawn_delivery(ChannelSink::new(tx)));
        consumers.push(rx);
    }

    for seq in 1..=10 {
        reader.on_frame_received(frame(seq, 5));
    }
    drop(reader);

    for (delivery, mut rx) in deliveries.into_iter().zip(consumers) {
        let report = tokio::time::timeout(WAIT, delivery).await.unwrap().unwrap();
        assert_eq!(report.reason, EvictionReason::ProducerLost);
        assert!(report.frames_written <= 10);

        // Frames still queued at eviction are discarded; what got through
        // is an in-order prefix of the stream
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames.len() as u64, report.frames_written);
        assert_eq!(
            sequences(&frames),
            (1..=report.frames_written).collect::<Vec<_>>()
        );
    }

    let stats = registry.stats("display-0").await.unwrap();
    assert!(stats.closed);
    assert_eq!(stats.evictions.producer_lost, 3);
    assert_eq!(stats.gop_frames, 0);
    assert_eq!(stats.gop_duration, 0);

    assert_eq!(
        registry.subscribe("display-0").await.unwrap_err(),
        RegistryError::ScanoutClosed("display-0".into())
    );
}

#[tokio::test]
async fn test_join_after_producer_loss_rejected() {
    let (reader, handle, task) = spawn_scanout("display-0", BroadcastConfig::default());
    reader.on_frame_received(frame(1, 5));
    drop(reader);

    // Issued before the broadcaster has seen the disconnect
    let result = handle.join().await;
    assert!(matches!(result, Err(RegistryError::ScanoutClosed(_))));

    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert!(handle.stats().closed);
    assert_eq!(handle.stats().subscriber_count, 0);
}

#[test]
fn test_viewers_replay_their_own_gop() {
    let (_reader, mut b) = sync_broadcaster(BroadcastConfig::default());

    for seq in 1..=3 {
        b.dispatch(frame(seq, 5));
    }
    let mut early = b.join().unwrap();

    for seq in 4..=7 {
        b.dispatch(frame(seq, 5));
    }
    let mut late = b.join().unwrap();

    for seq in 8..=9 {
        b.dispatch(frame(seq, 5));
    }

    let early_frames = drain(&mut early);
    let late_frames = drain(&mut late);

    assert_eq!(sequences(&early_frames), (1..=9).collect::<Vec<_>>());
    assert_eq!(sequences(&late_frames), vec![6, 7, 8, 9]);
    assert_gop_start_and_order(&early_frames);
    assert_gop_start_and_order(&late_frames);

    // Live portions agree
    let early_tail: Vec<u64> = sequences(&early_frames).into_iter().skip(5).collect();
    assert_eq!(early_tail, sequences(&late_frames));
}

#[test]
fn test_eviction_does_not_touch_other_subscribers() {
    let (_reader, mut b) = sync_broadcaster(BroadcastConfig::default().outbound_capacity(4));

    let a = b.join().unwrap();
    let mut other = b.join().unwrap();

    for seq in 1..=4 {
        b.dispatch(frame(seq, 100));
    }
    assert_eq!(other.try_recv().unwrap().sequence, 1);
    let queued_before = other.queued();

    // Frame 5 overflows `a` only
    b.dispatch(frame(5, 100));
    assert_eq!(
        a.state(),
        SubscriberState::Evicted(EvictionReason::SlowConsumer)
    );
    assert_eq!(other.state(), SubscriberState::Streaming);
    assert_eq!(other.queued(), queued_before + 1);
    assert_eq!(sequences(&drain(&mut other)), vec![2, 3, 4, 5]);

    // Explicit eviction leaves the survivor's queue alone as well
    let third = b.join().unwrap();
    b.dispatch(frame(6, 100));
    let queued = other.queued();
    assert!(b.leave(third.id(), EvictionReason::WriteFailed));
    assert_eq!(other.queued(), queued);
    assert_eq!(other.try_recv().unwrap().sequence, 6);
}

#[tokio::test]
async fn test_ingest_never_blocks_on_stalled_viewers() {
    let config = BroadcastConfig::default().outbound_capacity(8);
    let (reader, handle, _task) = spawn_scanout("display-0", config);

    // Joined but never read from
    let _idle: Vec<SubscriberHandle> = {
        let mut subs = Vec::new();
        for _ in 0..4 {
            subs.push(handle.join().await.unwrap());
        }
        subs
    };

    let started = Instant::now();
    for seq in 1..=10_000 {
        let status = reader.on_frame_received(frame(seq, 60));
        assert_ne!(status, IngestStatus::Closed);
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_ingest_never_blocks_without_broadcaster_progress() {
    let config = BroadcastConfig::default().inbound_capacity(4);
    let (reader, _broadcaster, _handle) = open_scanout("display-0", config);

    let started = Instant::now();
    let statuses: Vec<IngestStatus> = (1..=1_000)
        .map(|seq| reader.on_frame_received(frame(seq, 60)))
        .collect();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(statuses.iter().filter(|s| **s == IngestStatus::Queued).count(), 4);
    assert_eq!(reader.dropped(), 996);
}

#[test]
fn test_join_gets_keyframe_within_one_interval() {
    let (_reader, mut b) = sync_broadcaster(BroadcastConfig::default());

    // Mid-GOP join: the keyframe is already queued
    for seq in 1..=3 {
        b.dispatch(frame(seq, 10));
    }
    let mut mid = b.join().unwrap();
    assert!(mid.try_recv().unwrap().is_keyframe);

    // Join on an empty cache: the next live keyframe is the first frame
    let (_fresh_reader, mut fresh) = sync_broadcaster(BroadcastConfig::default());
    fresh.dispatch(Frame::delta(1, 0, Bytes::from_static(b"orphan")));
    let mut waiting = fresh.join().unwrap();
    assert_eq!(waiting.state(), SubscriberState::Joining);

    for seq in 2..=10 {
        fresh.dispatch(Frame::delta(seq, 0, Bytes::from_static(b"orphan")));
    }
    assert!(waiting.try_recv().is_none());

    fresh.dispatch(Frame::keyframe(11, 0, Bytes::from_static(b"idr")));
    let first = waiting.try_recv().unwrap();
    assert_eq!(first.sequence, 11);
    assert!(first.is_keyframe);
}
