//! accessory-bridge: answers messages from a duplex accessory channel
//!
//! The bridge waits for a peer accessory to become available, opens a
//! duplex byte channel to it, and runs one communication task that reads
//! each message and writes back a derived response.
//!
//! Features:
//! - Character device (USB gadget accessory) and TCP transports
//! - Pluggable response transforms: acknowledge, echo, ping
//! - Cancellation-aware session lifecycle with at most one live session
//! - Configuration via CLI arguments or TOML file

mod config;
mod error;
mod presence;
mod protocols;
mod runtime;
mod transport;

use config::Config;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        transport = ?config.transport,
        peer = %config.peer,
        transform = ?config.transform,
        buffer_size = config.buffer_size,
        zero_read = ?config.zero_read,
        "Starting accessory-bridge"
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                trigger.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    runtime::run(config, shutdown).await;
    Ok(())
}
