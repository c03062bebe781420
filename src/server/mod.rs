//! TCP relay server
//!
//! Producers connect to the ingest listener and viewers to the viewer
//! listener. Both open with a [`Hello`](handshake::Hello) naming the
//! scanout, then switch to the frame wire format.

pub mod config;
pub mod handshake;
pub mod listener;

pub use config::ServerConfig;
pub use handshake::{HandshakeStatus, Hello, Role};
pub use listener::FanoutServer;
