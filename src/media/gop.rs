//! GOP (Group of Pictures) cache for late-joiner support
//!
//! When a viewer joins a scanout mid-stream it cannot start decoding from an
//! arbitrary inter frame. The cache keeps:
//! 1. The most recent keyframe
//! 2. Every frame after it, up to (not including) the next keyframe
//!
//! Replaying the cache in order lets a new subscriber start decoding
//! immediately instead of waiting for the next keyframe.

use std::collections::VecDeque;

use super::frame::Frame;

/// Default cap on cached frames (30s at 60fps)
pub const DEFAULT_MAX_GOP_FRAMES: usize = 1800;

/// Outcome of pushing a frame into the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GopUpdate {
    /// Keyframe started a new GOP
    Started,
    /// Frame appended to the current GOP
    Appended,
    /// No keyframe yet, frame not cached
    Skipped,
    /// Frame did not advance past the cached sequence, not cached
    Stale,
    /// GOP grew past the frame cap and was discarded
    Overflowed,
}

/// GOP cache for one scanout
#[derive(Debug)]
pub struct GopCache {
    /// Maximum number of frames (keyframe included) held at once
    max_frames: usize,
    /// Keyframe that starts the cached GOP
    keyframe: Option<Frame>,
    /// Inter frames since the keyframe
    tail: VecDeque<Frame>,
    /// Total payload bytes held
    size: usize,
}

impl GopCache {
    /// Create a cache with the default frame cap
    pub fn new() -> Self {
        Self::with_max_frames(DEFAULT_MAX_GOP_FRAMES)
    }

    /// Create a cache holding at most `max_frames` frames
    pub fn with_max_frames(max_frames: usize) -> Self {
        Self {
            max_frames: max_frames.max(1),
            keyframe: None,
            tail: VecDeque::new(),
            size: 0,
        }
    }

    /// Feed the next dispatched frame
    ///
    /// A keyframe resets the cache. Inter frames are appended only when a
    /// keyframe is held; otherwise there is nothing decodable to extend.
    pub fn push(&mut self, frame: &Frame) -> GopUpdate {
        if frame.is_keyframe {
            self.clear();
            self.size = frame.size();
            self.keyframe = Some(frame.clone());
            return GopUpdate::Started;
        }

        let Some(last) = self.last_sequence() else {
            return GopUpdate::Skipped;
        };

        if frame.sequence <= last {
            return GopUpdate::Stale;
        }

        if self.frame_count() >= self.max_frames {
            // A truncated GOP would replay with a hole in the middle; drop it
            // and let joiners wait for the next keyframe instead.
            self.clear();
            return GopUpdate::Overflowed;
        }

        self.size += frame.size();
        self.tail.push_back(frame.clone());
        GopUpdate::Appended
    }

    /// Discard the cached GOP
    pub fn clear(&mut self) {
        self.keyframe = None;
        self.tail.clear();
        self.size = 0;
    }

    /// Whether a replayable GOP is held
    pub fn is_ready(&self) -> bool {
        self.keyframe.is_some()
    }

    /// Frames to replay for a new subscriber, keyframe first
    ///
    /// Returned frames are flagged as replayed. Empty when no keyframe has
    /// been seen.
    pub fn replay(&self) -> Vec<Frame> {
        let Some(key) = &self.keyframe else {
            return Vec::new();
        };

        let mut frames = Vec::with_capacity(1 + self.tail.len());
        frames.push(key.replayed());
        frames.extend(self.tail.iter().map(Frame::replayed));
        frames
    }

    /// Number of cached frames, keyframe included
    pub fn frame_count(&self) -> usize {
        match self.keyframe {
            Some(_) => 1 + self.tail.len(),
            None => 0,
        }
    }

    /// Total cached payload bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sequence number of the newest cached frame
    pub fn last_sequence(&self) -> Option<u64> {
        self.tail
            .back()
            .or(self.keyframe.as_ref())
            .map(|f| f.sequence)
    }

    /// Timestamp span of the cached GOP
    pub fn duration(&self) -> Option<u64> {
        let first = self.keyframe.as_ref()?.timestamp;
        let last = self.tail.back().map(|f| f.timestamp).unwrap_or(first);
        Some(last.saturating_sub(first))
    }
}

impl Default for GopCache {
    fn default() -> Self {
        Self::new()
    }
}
