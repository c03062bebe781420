//! Error types
//!
//! Crate-wide error type plus the per-concern error enums it wraps.

use std::fmt;
use std::io;

pub use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying I/O failure
    Io(io::Error),
    /// Malformed frame on the wire
    Codec(CodecError),
    /// Connection handshake failed
    Handshake(HandshakeError),
    /// Scanout lookup or lifecycle failure
    Registry(RegistryError),
    /// An operation did not complete within its deadline
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Codec(e) => write!(f, "Codec error: {}", e),
            Error::Handshake(e) => write!(f, "Handshake error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Codec(e) => Some(e),
            Error::Handshake(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Timeout => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::Handshake(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

/// Frame wire format errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Header did not start with the frame magic
    InvalidMagic([u8; 2]),
    /// Declared payload length exceeds the configured maximum
    PayloadTooLarge { len: usize, max: usize },
    /// Stream ended in the middle of a frame
    Truncated,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidMagic(m) => {
                write!(f, "Invalid frame magic: {:02x}{:02x}", m[0], m[1])
            }
            CodecError::PayloadTooLarge { len, max } => {
                write!(f, "Payload of {} bytes exceeds limit of {}", len, max)
            }
            CodecError::Truncated => write!(f, "Stream ended mid-frame"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Connection handshake errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Peer announced a role this listener does not serve
    UnexpectedRole(u8),
    /// Scanout id was empty, too long, or not UTF-8
    InvalidScanoutId,
    /// Peer sent an unsupported protocol version
    UnsupportedVersion(u8),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::UnexpectedRole(r) => write!(f, "Unexpected peer role: {:#04x}", r),
            HandshakeError::InvalidScanoutId => write!(f, "Invalid scanout id"),
            HandshakeError::UnsupportedVersion(v) => write!(f, "Unsupported version: {}", v),
        }
    }
}

impl std::error::Error for HandshakeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: Error = CodecError::PayloadTooLarge { len: 10, max: 4 }.into();
        assert_eq!(
            err.to_string(),
            "Codec error: Payload of 10 bytes exceeds limit of 4"
        );

        let err: Error = RegistryError::ScanoutClosed("display-0".into()).into();
        assert_eq!(err.to_string(), "Registry error: Scanout closed: display-0");
    }

    #[test]
    fn test_io_error_source() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(matches!(err, Error::Io(_)));
    }
}
