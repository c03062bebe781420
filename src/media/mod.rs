//! Media types
//!
//! This module provides:
//! - The encoded [`Frame`] value shared by every component
//! - GOP caching for late-joiner support
//! - The binary frame wire format used on producer and viewer connections

pub mod codec;
pub mod frame;
pub mod gop;

pub use codec::{FrameCodec, FrameReader};
pub use frame::Frame;
pub use gop::{GopCache, GopUpdate};
