//! Error types for the bridge.
//!
//! Each failure class is kept separate because each ends somewhere different:
//! open failures go back to whoever raised the availability signal, session
//! failures end only the communication task, and close failures are logged
//! while teardown carries on.

use crate::transport::PeerId;
use std::io;

/// Why a peer could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenErrorKind {
    /// The host refused access to the channel.
    PermissionDenied,
    /// Nothing answered at the peer identity.
    Unreachable,
    /// Any other failure reported by the channel.
    Other,
}

impl OpenErrorKind {
    fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => OpenErrorKind::PermissionDenied,
            io::ErrorKind::NotFound
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut => OpenErrorKind::Unreachable,
            _ => OpenErrorKind::Other,
        }
    }
}

/// Failure to open a duplex channel to a peer.
#[derive(Debug)]
pub struct OpenError {
    pub peer: PeerId,
    pub kind: OpenErrorKind,
    pub source: io::Error,
}

impl OpenError {
    pub fn new(peer: PeerId, source: io::Error) -> Self {
        Self {
            kind: OpenErrorKind::classify(&source),
            peer,
            source,
        }
    }
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            OpenErrorKind::PermissionDenied => {
                write!(f, "Permission denied opening peer '{}'", self.peer)
            }
            OpenErrorKind::Unreachable => write!(f, "Peer '{}' is unreachable", self.peer),
            OpenErrorKind::Other => write!(f, "Failed to open peer '{}'", self.peer),
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Fatal I/O failure inside a communication task.
#[derive(Debug)]
pub enum SessionError {
    /// Reading from the channel failed.
    Read(io::Error),
    /// Writing a response failed after `written` of `expected` bytes.
    ///
    /// `written` counts bytes the writer accepted. A buffering writer such as
    /// `tokio::fs::File` accepts bytes before they reach the device, so when
    /// the failure comes from the final flush some of them may not have.
    Write {
        written: usize,
        expected: usize,
        source: io::Error,
    },
}

impl SessionError {
    /// Whether part of a response reached the channel before the failure.
    pub fn is_partial_write(&self) -> bool {
        matches!(self, SessionError::Write { written, .. } if *written > 0)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Read(e) => write!(f, "Read failed: {e}"),
            SessionError::Write {
                written,
                expected,
                source,
            } => write!(
                f,
                "Write failed after {written} of {expected} response bytes: {source}"
            ),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Read(e) => Some(e),
            SessionError::Write { source, .. } => Some(source),
        }
    }
}

/// Failure while releasing a channel.
#[derive(Debug)]
pub struct CloseError {
    pub peer: PeerId,
    pub source: io::Error,
}

impl std::fmt::Display for CloseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to release peer '{}': {}", self.peer, self.source)
    }
}

impl std::error::Error for CloseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
