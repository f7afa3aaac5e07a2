//! Runtime for the accessory bridge.
//!
//! - `session`: the read/transform/write loop over one connection
//! - `lifecycle`: the Idle/Open state machine that opens connections,
//!   spawns exactly one session per connection, and tears both down
//!
//! The lifecycle manager owns the connection and the task handle; a running
//! session owns the endpoints until it ends and hands them back.

mod lifecycle;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use lifecycle::{LinkManager, Signal};
pub use session::SessionSettings;

use crate::config::{Config, TransportKind};
use crate::presence;
use crate::protocols;
use crate::transport::{DeviceTransport, TcpTransport, Transport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Signals buffered between the presence source and the manager.
const SIGNAL_QUEUE: usize = 16;

/// Run the bridge with the configured transport until `shutdown` fires.
pub async fn run(config: Config, shutdown: CancellationToken) {
    match config.transport {
        TransportKind::Device => run_with(DeviceTransport, config, shutdown).await,
        TransportKind::Tcp => {
            let transport = TcpTransport::new(config.connect_timeout);
            run_with(transport, config, shutdown).await
        }
    }
}

async fn run_with<T: Transport>(transport: T, config: Config, shutdown: CancellationToken) {
    let (tx, rx) = mpsc::channel(SIGNAL_QUEUE);

    let manager = LinkManager::new(
        transport,
        protocols::build(&config),
        config.session_settings(),
        config.shutdown_grace,
    );

    let source = match config.transport {
        TransportKind::Device => tokio::spawn(presence::watch_device(
            config.peer.clone(),
            config.poll_interval,
            tx,
            shutdown,
        )),
        TransportKind::Tcp => tokio::spawn(presence::announce(config.peer.clone(), tx, shutdown)),
    };

    // The manager stops once the presence source drops its sender.
    manager.run(rx).await;
    if let Err(e) = source.await {
        error!(error = %e, "Presence source failed");
    }
    info!("Bridge stopped");
}
