//! Connection handshake
//!
//! Every producer or viewer connection opens with a short hello naming the
//! peer's role and the scanout it wants; the server answers with a single
//! status byte before any frames flow.
//!
//! ```text
//! client ──► [version u8][role u8][id_len u8][scanout id, UTF-8]
//! server ◄── [status u8]
//! ```

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HandshakeError, RegistryError, Result};

/// Protocol version carried in the hello
pub const HANDSHAKE_VERSION: u8 = 1;

/// Longest scanout id that fits the length byte
pub const MAX_SCANOUT_ID_LEN: usize = u8::MAX as usize;

/// Which side of the fan-out a connection is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Publishes frames for a scanout
    Producer,
    /// Receives frames from a scanout
    Viewer,
}

impl Role {
    pub fn as_byte(self) -> u8 {
        match self {
            Role::Producer => b'P',
            Role::Viewer => b'V',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'P' => Some(Role::Producer),
            b'V' => Some(Role::Viewer),
            _ => None,
        }
    }
}

/// Opening message sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub role: Role,
    pub scanout_id: String,
}

impl Hello {
    pub fn producer(scanout_id: impl Into<String>) -> Self {
        Self {
            role: Role::Producer,
            scanout_id: scanout_id.into(),
        }
    }

    pub fn viewer(scanout_id: impl Into<String>) -> Self {
        Self {
            role: Role::Viewer,
            scanout_id: scanout_id.into(),
        }
    }

    /// Read a hello from the peer
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; 3];
        reader.read_exact(&mut header).await?;

        let [version, role, id_len] = header;
        if version != HANDSHAKE_VERSION {
            return Err(HandshakeError::UnsupportedVersion(version).into());
        }
        let role = Role::from_byte(role).ok_or(HandshakeError::UnexpectedRole(role))?;
        if id_len == 0 {
            return Err(HandshakeError::InvalidScanoutId.into());
        }

        let mut id = vec![0u8; id_len as usize];
        reader.read_exact(&mut id).await?;
        let scanout_id = String::from_utf8(id).map_err(|_| HandshakeError::InvalidScanoutId)?;

        Ok(Self { role, scanout_id })
    }

    /// Write this hello to the server
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let id = self.scanout_id.as_bytes();
        if id.is_empty() || id.len() > MAX_SCANOUT_ID_LEN {
            return Err(HandshakeError::InvalidScanoutId.into());
        }

        let mut buf = BytesMut::with_capacity(3 + id.len());
        buf.put_u8(HANDSHAKE_VERSION);
        buf.put_u8(self.role.as_byte());
        buf.put_u8(id.len() as u8);
        buf.put_slice(id);

        writer.write_all(&buf).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Server's answer to a hello
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    Accepted,
    ScanoutNotFound,
    ScanoutClosed,
    ScanoutAlreadyActive,
    Rejected,
}

impl HandshakeStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            HandshakeStatus::Accepted => 0,
            HandshakeStatus::ScanoutNotFound => 1,
            HandshakeStatus::ScanoutClosed => 2,
            HandshakeStatus::ScanoutAlreadyActive => 3,
            HandshakeStatus::Rejected => 4,
        }
    }

    /// Unknown codes read as `Rejected`
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => HandshakeStatus::Accepted,
            1 => HandshakeStatus::ScanoutNotFound,
            2 => HandshakeStatus::ScanoutClosed,
            3 => HandshakeStatus::ScanoutAlreadyActive,
            _ => HandshakeStatus::Rejected,
        }
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        Ok(Self::from_byte(reader.read_u8().await?))
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.as_byte()).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl From<&RegistryError> for HandshakeStatus {
    fn from(e: &RegistryError) -> Self {
        match e {
            RegistryError::ScanoutNotFound(_) => HandshakeStatus::ScanoutNotFound,
            RegistryError::ScanoutClosed(_) => HandshakeStatus::ScanoutClosed,
            RegistryError::ScanoutAlreadyActive(_) => HandshakeStatus::ScanoutAlreadyActive,
        }
    }
}
