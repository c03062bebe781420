//! Frame wire format
//!
//! Producers and viewers exchange frames over byte streams using a fixed
//! header followed by the payload:
//!
//! ```text
//! +-----------+----------+--------------+---------------+------------+-------------+
//! | Magic(2)  | Flags(1) | Sequence(8)  | Timestamp(8)  | Length(4)  | Payload(N)  |
//! | "SF"      |          | big-endian   | big-endian    | big-endian |             |
//! +-----------+----------+--------------+---------------+------------+-------------+
//! ```
//!
//! Flags: bit 0 = keyframe, bit 1 = replayed catch-up frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{CodecError, Result};

use super::frame::Frame;

/// Frame header magic
pub const FRAME_MAGIC: [u8; 2] = *b"SF";

/// Size of the fixed frame header
pub const HEADER_SIZE: usize = 2 + 1 + 8 + 8 + 4;

/// Default payload limit (16 MiB)
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

const FLAG_KEYFRAME: u8 = 0x01;
const FLAG_REPLAY: u8 = 0x02;

/// Stateless encoder/decoder for the frame wire format
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_payload: usize,
}

impl FrameCodec {
    /// Create a codec with the default payload limit
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a codec rejecting payloads larger than `max_payload`
    ///
    /// The limit is capped at what the 32-bit length field can carry.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            max_payload: max_payload.min(u32::MAX as usize),
        }
    }

    /// Maximum accepted payload size
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Append the encoded frame to `buf`
    ///
    /// Payloads over the limit are rejected and leave `buf` untouched.
    pub fn encode_into(
        &self,
        frame: &Frame,
        buf: &mut BytesMut,
    ) -> std::result::Result<(), CodecError> {
        let len = frame.payload.len();
        if len > self.max_payload {
            return Err(CodecError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }

        let mut flags = 0u8;
        if frame.is_keyframe {
            flags |= FLAG_KEYFRAME;
        }
        if frame.is_replay {
            flags |= FLAG_REPLAY;
        }

        buf.reserve(HEADER_SIZE + len);
        buf.put_slice(&FRAME_MAGIC);
        buf.put_u8(flags);
        buf.put_u64(frame.sequence);
        buf.put_u64(frame.timestamp);
        // Bounded by `max_payload`, which never exceeds u32::MAX
        buf.put_u32(len as u32);
        buf.put_slice(&frame.payload);
        Ok(())
    }

    /// Encode a single frame
    pub fn encode(&self, frame: &Frame) -> std::result::Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + frame.payload.len());
        self.encode_into(frame, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Try to decode one frame from the front of `buf`
    ///
    /// Returns `Ok(None)` when more data is needed. Consumed bytes are
    /// removed from `buf`; the payload is split off without copying.
    pub fn decode(&self, buf: &mut BytesMut) -> std::result::Result<Option<Frame>, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        if buf[0..2] != FRAME_MAGIC {
            return Err(CodecError::InvalidMagic([buf[0], buf[1]]));
        }

        let len = u32::from_be_bytes([buf[19], buf[20], buf[21], buf[22]]) as usize;
        if len > self.max_payload {
            return Err(CodecError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }

        if buf.len() < HEADER_SIZE + len {
            buf.reserve(HEADER_SIZE + len - buf.len());
            return Ok(None);
        }

        buf.advance(2);
        let flags = buf.get_u8();
        let sequence = buf.get_u64();
        let timestamp = buf.get_u64();
        let _ = buf.get_u32();
        let payload = buf.split_to(len).freeze();

        Ok(Some(Frame {
            sequence,
            timestamp,
            payload,
            is_keyframe: flags & FLAG_KEYFRAME != 0,
            is_replay: flags & FLAG_REPLAY != 0,
        }))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads framed [`Frame`]s from an async byte stream
pub struct FrameReader<R> {
    reader: R,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader using the given codec and read buffer size
    pub fn new(reader: R, codec: FrameCodec, buffer_size: usize) -> Self {
        Self {
            reader,
            codec,
            buf: BytesMut::with_capacity(buffer_size),
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` on a clean end of stream (between frames).
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(frame));
            }

            let n = self.reader.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(CodecError::Truncated.into());
            }
        }
    }

    /// Unwrap the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}
