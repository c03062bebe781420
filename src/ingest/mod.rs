//! Producer ingest
//!
//! One [`IngestReader`] per scanout reads from the producer and feeds the
//! broadcaster's inbound queue without ever blocking on it.

pub mod reader;
pub mod source;

pub use reader::{IngestReader, IngestStatus};
pub use source::FrameSource;
