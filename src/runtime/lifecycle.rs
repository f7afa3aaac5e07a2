//! Connection lifecycle manager.
//!
//! Owns the single connection and the single communication task bound to
//! it, and moves between two states:
//!
//! ```text
//!            peer_available (open ok)
//!   Idle ─────────────────────────────▶ Open
//!    ▲                                   │ peer_available: tear down, reopen
//!    └──── peer_unavailable / session ◀──┘
//!          ended / reopen failed
//! ```
//!
//! Teardown always cancels the task, waits for it to hand the connection
//! back (bounded by the shutdown grace), and releases the connection.
//! Release failures are logged, never returned.

use super::session::{communicate, SessionExit, SessionReport, SessionSettings};
use crate::error::{CloseError, OpenError};
use crate::protocols::Transform;
use crate::transport::{Connection, ConnectionId, PeerId, Transport, TransportConnection};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Availability signal from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Available(PeerId),
    Unavailable,
}

/// Observable manager state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Open { id: ConnectionId, peer: PeerId },
}

/// What a finished communication task hands back.
pub struct SessionOutcome<T: Transport> {
    pub report: SessionReport,
    pub connection: TransportConnection<T>,
}

struct ActiveLink<T: Transport> {
    id: ConnectionId,
    peer: PeerId,
    cancel: CancellationToken,
    task: JoinHandle<SessionOutcome<T>>,
}

enum LinkState<T: Transport> {
    Idle,
    Open(ActiveLink<T>),
}

pub struct LinkManager<T: Transport> {
    transport: T,
    transform: Arc<dyn Transform>,
    settings: SessionSettings,
    shutdown_grace: Duration,
    state: LinkState<T>,
    next_id: u64,
}

impl<T: Transport> LinkManager<T> {
    pub fn new(
        transport: T,
        transform: Arc<dyn Transform>,
        settings: SessionSettings,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            transport,
            transform,
            settings,
            shutdown_grace,
            state: LinkState::Idle,
            next_id: 0,
        }
    }

    pub fn status(&self) -> LinkStatus {
        match &self.state {
            LinkState::Idle => LinkStatus::Idle,
            LinkState::Open(link) => LinkStatus::Open {
                id: link.id,
                peer: link.peer.clone(),
            },
        }
    }

    /// Open `peer` and start a communication task on it.
    ///
    /// Any current connection is torn down first, so its task has stopped
    /// and its channel has been released before the new one is opened. On
    /// failure the manager is left idle.
    pub async fn peer_available(&mut self, peer: PeerId) -> Result<ConnectionId, OpenError> {
        self.teardown("superseded").await;

        let (reader, writer) = self.transport.open(&peer).await?;

        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        let connection = Connection {
            id,
            peer: peer.clone(),
            reader,
            writer,
        };

        let cancel = CancellationToken::new();
        let task = spawn_session::<T>(
            connection,
            Arc::clone(&self.transform),
            self.settings.clone(),
            cancel.clone(),
        );

        info!(
            id = %id,
            peer = %peer,
            transport = self.transport.name(),
            transform = self.transform.name(),
            "Accessory opened"
        );

        self.state = LinkState::Open(ActiveLink {
            id,
            peer,
            cancel,
            task,
        });
        Ok(id)
    }

    /// Stop the active task and release its connection. No-op when idle.
    pub async fn peer_unavailable(&mut self) {
        self.teardown("peer unavailable").await;
    }

    /// Ask the active task to stop without releasing its connection.
    ///
    /// No-op when idle or already cancelled. The connection is released
    /// when the manager next observes the task's end.
    pub fn cancel(&self) {
        if let LinkState::Open(link) = &self.state {
            link.cancel.cancel();
        }
    }

    /// Consume availability signals until the sender side closes, then tear
    /// down.
    pub async fn run(mut self, mut signals: mpsc::Receiver<Signal>) {
        info!(transport = self.transport.name(), "Waiting for accessory");

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(Signal::Available(peer)) => {
                        if let Err(e) = self.peer_available(peer).await {
                            warn!(error = %e, kind = ?e.kind, cause = %e.source, "Accessory not opened");
                        }
                    }
                    Some(Signal::Unavailable) => self.peer_unavailable().await,
                    None => break,
                },
                joined = self.session_ended() => self.reap(joined).await,
            }
            debug!(status = ?self.status(), "Link state");
        }

        self.teardown("shutdown").await;
        info!("Lifecycle manager stopped");
    }

    /// Resolves when the active task ends on its own; pending while idle.
    async fn session_ended(&mut self) -> Result<SessionOutcome<T>, JoinError> {
        match &mut self.state {
            LinkState::Open(link) => (&mut link.task).await,
            LinkState::Idle => std::future::pending().await,
        }
    }

    /// Clean up after a task that already finished.
    async fn reap(&mut self, joined: Result<SessionOutcome<T>, JoinError>) {
        if let LinkState::Open(link) = std::mem::replace(&mut self.state, LinkState::Idle) {
            self.finish(link.id, &link.peer, joined).await;
        }
    }

    async fn teardown(&mut self, reason: &'static str) {
        self.cancel();
        let LinkState::Open(mut link) = std::mem::replace(&mut self.state, LinkState::Idle) else {
            return;
        };

        debug!(id = %link.id, reason, "Stopping communication task");

        match tokio::time::timeout(self.shutdown_grace, &mut link.task).await {
            Ok(joined) => self.finish(link.id, &link.peer, joined).await,
            Err(_) => {
                link.task.abort();
                warn!(
                    id = %link.id,
                    peer = %link.peer,
                    grace = ?self.shutdown_grace,
                    "Communication task did not stop in time, dropped its channel without release"
                );
            }
        }
    }

    async fn finish(
        &self,
        id: ConnectionId,
        peer: &PeerId,
        joined: Result<SessionOutcome<T>, JoinError>,
    ) {
        match joined {
            Ok(SessionOutcome { report, connection }) => {
                log_report(id, &report);
                self.release(connection).await;
            }
            Err(e) => {
                error!(id = %id, peer = %peer, error = %e, "Communication task failed");
            }
        }
    }

    /// Close the channel, giving up after the shutdown grace.
    async fn release(&self, connection: TransportConnection<T>) {
        let id = connection.id;
        let peer = connection.peer.clone();

        let closed = tokio::time::timeout(self.shutdown_grace, self.transport.close(connection))
            .await
            .unwrap_or_else(|_| {
                Err(CloseError {
                    peer: peer.clone(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("release did not complete within {:?}", self.shutdown_grace),
                    ),
                })
            });

        match closed {
            Ok(()) => info!(id = %id, peer = %peer, "Accessory closed"),
            Err(e) => error!(id = %id, error = %e, cause = %e.source, "Error closing accessory"),
        }
    }
}

fn spawn_session<T: Transport>(
    mut connection: TransportConnection<T>,
    transform: Arc<dyn Transform>,
    settings: SessionSettings,
    cancel: CancellationToken,
) -> JoinHandle<SessionOutcome<T>> {
    let span = info_span!("session", id = %connection.id, peer = %connection.peer);

    tokio::spawn(
        async move {
            debug!("Communication task started");
            let report = communicate(
                &mut connection.reader,
                &mut connection.writer,
                transform.as_ref(),
                &settings,
                &cancel,
            )
            .await;
            debug!("Communication task ended");
            SessionOutcome { report, connection }
        }
        .instrument(span),
    )
}

fn log_report(id: ConnectionId, report: &SessionReport) {
    let stats = &report.stats;
    match &report.exit {
        SessionExit::Cancelled => info!(
            id = %id,
            cycles = stats.cycles,
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "Communication task cancelled"
        ),
        SessionExit::PeerClosed => info!(
            id = %id,
            cycles = stats.cycles,
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "Peer closed the channel"
        ),
        SessionExit::Failed(e) if e.is_partial_write() => error!(
            id = %id,
            cycles = stats.cycles,
            error = %e,
            "Communication error, last response truncated"
        ),
        SessionExit::Failed(e) => warn!(
            id = %id,
            cycles = stats.cycles,
            idle_reads = stats.idle_reads,
            error = %e,
            "Communication error"
        ),
    }
}
