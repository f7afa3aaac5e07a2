//! Availability signal sources.
//!
//! - `watch_device`: polls a device path and reports it appearing and
//!   disappearing (edge-triggered)
//! - `announce`: reports a peer available once, for transports with no
//!   presence notion of their own
//!
//! Both return when `shutdown` fires, dropping their sender, which is what
//! tells the lifecycle manager to tear down and stop.

use crate::runtime::Signal;
use crate::transport::PeerId;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Watch `peer` as a filesystem path, emitting a signal on every change.
pub async fn watch_device(
    peer: PeerId,
    interval: Duration,
    tx: mpsc::Sender<Signal>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut present = false;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = match tokio::fs::try_exists(peer.as_str()).await {
            Ok(exists) => exists,
            Err(e) => {
                debug!(path = %peer, error = %e, "Cannot check accessory path, treating as absent");
                false
            }
        };
        if now == present {
            continue;
        }
        present = now;

        let signal = if present {
            info!(path = %peer, "Accessory attached");
            Signal::Available(peer.clone())
        } else {
            info!(path = %peer, "Accessory detached");
            Signal::Unavailable
        };

        if tx.send(signal).await.is_err() {
            break;
        }
    }

    debug!(path = %peer, "Device watcher stopped");
}

/// Report `peer` available once, then hold the channel open until shutdown.
pub async fn announce(peer: PeerId, tx: mpsc::Sender<Signal>, shutdown: CancellationToken) {
    if tx.send(Signal::Available(peer)).await.is_err() {
        return;
    }
    shutdown.cancelled().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next(rx: &mut mpsc::Receiver<Signal>) -> Option<Signal> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no signal within 5s")
    }

    #[tokio::test]
    async fn test_watch_device_edges() {
        let path = std::env::temp_dir().join(format!(
            "accessory-bridge-{}-presence",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let peer = PeerId::from(path.to_string_lossy().into_owned());

        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let watcher = tokio::spawn(watch_device(
            peer.clone(),
            Duration::from_millis(5),
            tx,
            shutdown.clone(),
        ));

        std::fs::write(&path, b"").unwrap();
        assert_eq!(next(&mut rx).await, Some(Signal::Available(peer)));

        std::fs::remove_file(&path).unwrap();
        assert_eq!(next(&mut rx).await, Some(Signal::Unavailable));

        shutdown.cancel();
        watcher.await.unwrap();
        assert_eq!(next(&mut rx).await, None);
    }

    #[tokio::test]
    async fn test_unreadable_path_treated_as_absent() {
        // A path below a regular file cannot be checked (ENOTDIR).
        let file = std::env::temp_dir().join(format!(
            "accessory-bridge-{}-notdir",
            std::process::id()
        ));
        std::fs::write(&file, b"").unwrap();
        let peer = PeerId::from(file.join("accessory").to_string_lossy().into_owned());

        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let watcher = tokio::spawn(watch_device(
            peer,
            Duration::from_millis(5),
            tx,
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        shutdown.cancel();
        watcher.await.unwrap();
        assert_eq!(next(&mut rx).await, None);
        std::fs::remove_file(&file).unwrap();
    }

    #[tokio::test]
    async fn test_announce_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let peer = PeerId::from("127.0.0.1:7777");

        let announcer = tokio::spawn(announce(peer.clone(), tx, shutdown.clone()));
        assert_eq!(next(&mut rx).await, Some(Signal::Available(peer)));

        shutdown.cancel();
        announcer.await.unwrap();
        assert_eq!(next(&mut rx).await, None);
    }
}
