//! Duplex channel transports.
//!
//! A transport turns a peer identity into a readable and a writable endpoint
//! and releases them again. Two implementations are provided:
//! - `device`: a character device opened read/write (e.g. the USB gadget
//!   accessory node)
//! - `tcp`: a TCP stream to `host:port`, mostly for driving the bridge from
//!   a simulator
//!
//! The communication loop only ever sees `AsyncRead`/`AsyncWrite`, so a new
//! channel type needs nothing beyond another `Transport` impl.

mod device;
mod tcp;

pub use device::DeviceTransport;
pub use tcp::TcpTransport;

use crate::error::{CloseError, OpenError};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opaque identity of a peer (device path or `host:port`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        PeerId(value.to_string())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        PeerId(value)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the lifecycle manager assigns to each opened connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One open duplex channel to a peer.
#[derive(Debug)]
pub struct Connection<R, W> {
    pub id: ConnectionId,
    pub peer: PeerId,
    pub reader: R,
    pub writer: W,
}

/// Connection type produced by a given transport.
pub type TransportConnection<T> = Connection<<T as Transport>::Reader, <T as Transport>::Writer>;

/// Opens and releases duplex channels.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Open a duplex channel to `peer`.
    async fn open(&self, peer: &PeerId) -> Result<(Self::Reader, Self::Writer), OpenError>;

    /// Release both endpoints of a connection.
    ///
    /// Consumes the connection, so the same channel cannot be released twice.
    /// The endpoints are dropped even when this returns an error.
    async fn close(&self, connection: Connection<Self::Reader, Self::Writer>)
        -> Result<(), CloseError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
