//! Per-scanout encoded video fan-out
//!
//! One producer per scanout publishes encoded frames; any number of viewers
//! subscribe. Each viewer gets its own bounded queue and delivery task, so a
//! slow viewer is evicted instead of stalling the producer or its peers, and
//! late joiners start cleanly from the cached GOP.
//!
//! ```no_run
//! use scanout_fanout::{ScanoutRegistry, ChannelSink};
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ScanoutRegistry::new();
//! let reader = registry.register("display-0").await?;
//!
//! let viewer = registry.subscribe("display-0").await?;
//! let (tx, mut frames) = mpsc::channel(64);
//! viewer.spawn_delivery(ChannelSink::new(tx));
//!
//! // reader.on_frame_received(frame) for each encoded frame ...
//! # drop(reader);
//! # let _ = frames.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod ingest;
pub mod media;
pub mod registry;
pub mod server;
pub mod stats;
pub mod subscriber;

pub use broadcast::{BroadcastConfig, BroadcasterHandle, FrameBroadcaster};
pub use error::{Error, Result};
pub use ingest::{FrameSource, IngestReader, IngestStatus};
pub use media::{Frame, FrameCodec, FrameReader};
pub use registry::{RegistryConfig, RegistryError, ScanoutRegistry};
pub use server::{FanoutServer, ServerConfig};
pub use stats::{ScanoutStats, SubscriberStats};
pub use subscriber::{
    ChannelSink, DeliveryReport, EvictionReason, OutputSink, SubscriberHandle, SubscriberState,
    WriterSink,
};
