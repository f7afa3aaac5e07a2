//! The duplex communication loop.
//!
//! Each cycle reads one chunk into a fixed-capacity scratch buffer, derives a
//! response with the configured transform, and writes the whole response
//! back before reading again. Responses therefore leave in the order their
//! messages arrived.
//!
//! ## Termination
//!
//! The loop never retries. It ends when:
//! - the cancellation token fires (checked before every read and raced
//!   against the read itself, so a read that would block forever still
//!   yields promptly)
//! - a read or write fails, or a configured timeout elapses
//! - a zero-length read arrives under `ZeroReadPolicy::PeerClosed`
//!
//! Cancellation is not raced against writes: a response is either written in
//! full or the failure is reported with the number of bytes that got out.

use crate::config::{ZeroReadPolicy, DEFAULT_BUFFER_SIZE};
use crate::error::SessionError;
use crate::protocols::Transform;
use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Per-session behaviour knobs.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Scratch buffer capacity; the most a single read can return.
    pub buffer_size: usize,
    pub zero_read: ZeroReadPolicy,
    /// Pause after a zero-length read under `ZeroReadPolicy::Idle`.
    pub idle_backoff: Duration,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            zero_read: ZeroReadPolicy::Idle,
            idle_backoff: Duration::from_millis(10),
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Counters for one session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Completed read/transform/write cycles.
    pub cycles: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Reads that returned zero bytes.
    pub idle_reads: u64,
}

/// Why a session ended.
#[derive(Debug)]
pub enum SessionExit {
    Cancelled,
    PeerClosed,
    Failed(SessionError),
}

#[derive(Debug)]
pub struct SessionReport {
    pub exit: SessionExit,
    pub stats: SessionStats,
}

/// Run the read/transform/write cycle until cancellation, peer close, or a
/// fatal I/O error.
pub async fn communicate<R, W>(
    reader: &mut R,
    writer: &mut W,
    transform: &dyn Transform,
    settings: &SessionSettings,
    cancel: &CancellationToken,
) -> SessionReport
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = SessionStats::default();
    let exit = run_cycles(reader, writer, transform, settings, cancel, &mut stats).await;
    SessionReport { exit, stats }
}

async fn run_cycles<R, W>(
    reader: &mut R,
    writer: &mut W,
    transform: &dyn Transform,
    settings: &SessionSettings,
    cancel: &CancellationToken,
    stats: &mut SessionStats,
) -> SessionExit
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(settings.buffer_size);

    loop {
        if cancel.is_cancelled() {
            return SessionExit::Cancelled;
        }

        buffer.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionExit::Cancelled,
            read = bounded(settings.read_timeout, "read", reader.read_buf(&mut buffer)) => read,
        };

        let n = match read {
            Ok(n) => n,
            Err(e) => return SessionExit::Failed(SessionError::Read(e)),
        };

        if n == 0 {
            match settings.zero_read {
                ZeroReadPolicy::PeerClosed => {
                    debug!("Zero-length read, treating channel as closed");
                    return SessionExit::PeerClosed;
                }
                ZeroReadPolicy::Idle => {
                    stats.idle_reads += 1;
                    trace!("Zero-length read");
                    if settings.idle_backoff.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return SessionExit::Cancelled,
                            _ = tokio::time::sleep(settings.idle_backoff) => {}
                        }
                    }
                    continue;
                }
            }
        }

        stats.bytes_read += n as u64;
        let message = &buffer[..n];
        debug!(
            bytes = n,
            message = %String::from_utf8_lossy(message),
            "Received message"
        );

        let response = transform.respond(message);

        let mut written = 0;
        let result = bounded(
            settings.write_timeout,
            "write",
            write_response(writer, &response, &mut written),
        )
        .await;
        stats.bytes_written += written as u64;

        if let Err(source) = result {
            return SessionExit::Failed(SessionError::Write {
                written,
                expected: response.len(),
                source,
            });
        }

        stats.cycles += 1;
        trace!(bytes = response.len(), "Responded");
    }
}

/// Write all of `payload`, continuing after short writes.
///
/// `written` tracks progress so the caller can report how much of the
/// response got out even if this future is dropped by a timeout. It counts
/// bytes accepted by `writer`, which for buffered writers is ahead of what
/// the flush has pushed to the channel.
async fn write_response<W>(writer: &mut W, payload: &[u8], written: &mut usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while *written < payload.len() {
        match writer.write(&payload[*written..]).await {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "channel accepted no bytes",
                ))
            }
            Ok(n) => *written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    writer.flush().await
}

/// Apply an optional timeout to an I/O future.
async fn bounded<T, F>(limit: Option<Duration>, op: &'static str, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{op} timed out after {limit:?}"),
            ))
        }),
        None => fut.await,
    }
}
