//! Output sinks
//!
//! An [`OutputSink`] is the viewer's end of the pipe. The delivery loop calls
//! [`OutputSink::write`] once per frame; the call may block for as long as
//! the viewer's network needs, bounded by the configured write timeout.

use std::future::Future;
use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::media::{Frame, FrameCodec};

/// Destination for one subscriber's frames
pub trait OutputSink: Send {
    /// Transmit one frame
    fn write(&mut self, frame: &Frame) -> impl Future<Output = io::Result<()>> + Send;
}

/// Writes frames to a byte stream using the frame wire format
pub struct WriterSink<W> {
    writer: W,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W, codec: FrameCodec) -> Self {
        Self {
            writer,
            codec,
            buf: BytesMut::new(),
        }
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> OutputSink for WriterSink<W> {
    async fn write(&mut self, frame: &Frame) -> io::Result<()> {
        self.buf.clear();
        self.codec
            .encode_into(frame, &mut self.buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await
    }
}

/// Forwards frames to an in-process consumer
///
/// A full channel makes `write` wait, so a stalled consumer is caught by the
/// write timeout like any slow network peer.
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }
}

impl OutputSink for ChannelSink {
    async fn write(&mut self, frame: &Frame) -> io::Result<()> {
        self.tx
            .send(frame.clone())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "consumer dropped"))
    }
}
