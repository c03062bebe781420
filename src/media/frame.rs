//! Encoded video frame type
//!
//! A [`Frame`] is one discrete unit of encoded video as emitted by the
//! producer. Frames are cheap to clone: the payload is a reference-counted
//! [`Bytes`], so every subscriber of a scanout shares the same allocation.

use bytes::Bytes;

/// One encoded video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Producer-assigned sequence number (monotonic, may have gaps)
    pub sequence: u64,
    /// Producer timestamp (opaque to the fan-out core)
    pub timestamp: u64,
    /// Encoded frame data (zero-copy via reference counting)
    pub payload: Bytes,
    /// Whether the frame can be decoded without any prior frame
    pub is_keyframe: bool,
    /// Whether the frame is being delivered as part of a GOP replay
    pub is_replay: bool,
}

impl Frame {
    /// Create a frame as received from a producer
    pub fn new(sequence: u64, timestamp: u64, payload: Bytes, is_keyframe: bool) -> Self {
        Self {
            sequence,
            timestamp,
            payload,
            is_keyframe,
            is_replay: false,
        }
    }

    /// Create a keyframe
    pub fn keyframe(sequence: u64, timestamp: u64, payload: Bytes) -> Self {
        Self::new(sequence, timestamp, payload, true)
    }

    /// Create an inter (delta) frame
    pub fn delta(sequence: u64, timestamp: u64, payload: Bytes) -> Self {
        Self::new(sequence, timestamp, payload, false)
    }

    /// Copy of this frame flagged as replayed catch-up data
    ///
    /// Only the header is copied; the payload stays shared.
    pub fn replayed(&self) -> Self {
        Self {
            is_replay: true,
            ..self.clone()
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
