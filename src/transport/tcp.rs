//! TCP transport. The peer identity is `host:port`.

use super::{Connection, PeerId, Transport};
use crate::error::{CloseError, OpenError};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct TcpTransport {
    /// Upper bound on connection establishment (None = OS default)
    pub connect_timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    async fn connect(&self, peer: &PeerId) -> io::Result<TcpStream> {
        let connect = TcpStream::connect(peer.as_str());
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {limit:?}"),
                )
            })??,
            None => connect.await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn open(&self, peer: &PeerId) -> Result<(Self::Reader, Self::Writer), OpenError> {
        let stream = self
            .connect(peer)
            .await
            .map_err(|e| OpenError::new(peer.clone(), e))?;

        if let Ok(local) = stream.local_addr() {
            debug!(peer = %peer, local = %local, "TCP peer connected");
        }
        Ok(stream.into_split())
    }

    async fn close(
        &self,
        connection: Connection<Self::Reader, Self::Writer>,
    ) -> Result<(), CloseError> {
        let Connection {
            peer,
            reader,
            mut writer,
            ..
        } = connection;

        let shutdown = writer.shutdown().await;
        let stream = reader.reunite(writer).map_err(|e| CloseError {
            peer: peer.clone(),
            source: io::Error::other(e),
        })?;
        drop(stream);

        match shutdown {
            Ok(()) => Ok(()),
            // The peer may already have gone away; that is not a release failure.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(source) => Err(CloseError { peer, source }),
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}
