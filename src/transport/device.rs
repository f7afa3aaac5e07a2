//! Character device transport.
//!
//! The peer identity is a filesystem path such as `/dev/usb_accessory`.
//! Both endpoints are halves of one file handle opened read/write.
//!
//! tokio services file reads on its blocking pool, so a read that the device
//! never completes keeps one blocking thread busy until the device returns
//! (usually with an error once the accessory detaches). The session itself is
//! still released promptly because cancellation races the read.
//!
//! A cancelled read keeps running on that thread, and flushing or shutting
//! down a `File` waits for it. Closing therefore only drops the handle. The
//! session flushes after every response, so no written bytes are lost.

use super::{Connection, PeerId, Transport};
use crate::error::{CloseError, OpenError};
use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{ReadHalf, WriteHalf};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct DeviceTransport;

#[async_trait]
impl Transport for DeviceTransport {
    type Reader = ReadHalf<File>;
    type Writer = WriteHalf<File>;

    async fn open(&self, peer: &PeerId) -> Result<(Self::Reader, Self::Writer), OpenError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(peer.as_str())
            .await
            .map_err(|e| OpenError::new(peer.clone(), e))?;

        debug!(path = %peer, "Device opened");
        Ok(tokio::io::split(file))
    }

    async fn close(
        &self,
        connection: Connection<Self::Reader, Self::Writer>,
    ) -> Result<(), CloseError> {
        let Connection {
            peer,
            reader,
            writer,
            ..
        } = connection;

        // The descriptor itself closes once any orphaned read returns.
        drop(reader.unsplit(writer));
        debug!(path = %peer, "Device released");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "device"
    }
}
