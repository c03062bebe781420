//! Per-subscriber delivery loop
//!
//! The only place in the fan-out path where waiting on a slow party is
//! allowed: the loop blocks on its own queue and on its own sink, and
//! nothing else waits on it.

use tokio::time::timeout;

use super::handle::SubscriberHandle;
use super::sink::OutputSink;
use super::state::EvictionReason;

/// Summary of a finished delivery loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscriber id
    pub subscriber_id: u64,
    /// Frames successfully written to the sink
    pub frames_written: u64,
    /// Payload bytes successfully written
    pub bytes_written: u64,
    /// Why delivery stopped
    pub reason: EvictionReason,
}

pub(crate) async fn run_delivery<S: OutputSink>(
    mut handle: SubscriberHandle,
    mut sink: S,
) -> DeliveryReport {
    let write_timeout = handle.write_timeout();
    let mut frames_written = 0u64;
    let mut bytes_written = 0u64;

    tracing::debug!(
        scanout = %handle.scanout_id(),
        subscriber = handle.id(),
        "Delivery started"
    );

    let reason = loop {
        let Some(frame) = handle.recv().await else {
            break handle
                .state()
                .eviction_reason()
                .unwrap_or(EvictionReason::ProducerLost);
        };

        match timeout(write_timeout, sink.write(&frame)).await {
            Ok(Ok(())) => {
                frames_written += 1;
                bytes_written += frame.size() as u64;
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    scanout = %handle.scanout_id(),
                    subscriber = handle.id(),
                    sequence = frame.sequence,
                    error = %e,
                    "Sink write failed"
                );
                handle.request_leave(EvictionReason::WriteFailed).await;
                break EvictionReason::WriteFailed;
            }
            Err(_) => {
                tracing::warn!(
                    scanout = %handle.scanout_id(),
                    subscriber = handle.id(),
                    sequence = frame.sequence,
                    timeout_ms = write_timeout.as_millis() as u64,
                    "Sink write timed out"
                );
                handle.request_leave(EvictionReason::WriteFailed).await;
                break EvictionReason::WriteFailed;
            }
        }
    };

    tracing::debug!(
        scanout = %handle.scanout_id(),
        subscriber = handle.id(),
        frames = frames_written,
        bytes = bytes_written,
        reason = %reason,
        "Delivery finished"
    );

    DeliveryReport {
        subscriber_id: handle.id(),
        frames_written,
        bytes_written,
        reason,
    }
}
