//! Producer-side frame sources

use std::future::Future;

use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::media::{Frame, FrameReader};

/// Something the ingest reader can pull frames from
///
/// `Ok(None)` means the producer closed the stream cleanly; an error means
/// the connection failed. Both are terminal for the scanout.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> impl Future<Output = Result<Option<Frame>>> + Send;
}

/// Framed byte stream (e.g. a producer TCP connection)
impl<R> FrameSource for FrameReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.read_frame().await
    }
}

/// In-process producer
impl FrameSource for mpsc::Receiver<Frame> {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.recv().await)
    }
}
