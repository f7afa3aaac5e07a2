//! Scripted channel doubles shared by the runtime tests.
//!
//! `tokio_test::io::Builder` covers plain read/write scripts; these cover
//! what it cannot express: zero-length reads, reads that never complete,
//! partial writes, and a transport whose opens and releases can be observed.

use crate::error::{CloseError, OpenError};
use crate::transport::{Connection, PeerId, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Ordered record of channel events, shared between doubles.
#[derive(Debug, Default, Clone)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

/// One scripted read result.
#[derive(Debug)]
pub enum Step {
    Data(Vec<u8>),
    Zero,
    Fail(io::ErrorKind),
}

/// Reader that replays a script, then never completes.
pub struct ScriptedReader {
    label: String,
    steps: VecDeque<Step>,
    log: EventLog,
}

impl ScriptedReader {
    pub fn new(label: &str, steps: Vec<Step>, log: &EventLog) -> Self {
        Self {
            label: label.to_string(),
            steps: steps.into(),
            log: log.clone(),
        }
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let event = format!("{}:read", self.label);
        self.log.push(event);

        match self.steps.pop_front() {
            Some(Step::Data(data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                Poll::Ready(Ok(()))
            }
            Some(Step::Zero) => Poll::Ready(Ok(())),
            Some(Step::Fail(kind)) => Poll::Ready(Err(kind.into())),
            None => Poll::Pending,
        }
    }
}

/// Writer that records everything accepted.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    accepted: Arc<Mutex<Vec<u8>>>,
    calls: Arc<Mutex<usize>>,
    /// Accept at most this many bytes per call.
    max_chunk: Option<usize>,
    /// Fail with `BrokenPipe` once this many bytes have been accepted.
    fail_after: Option<usize>,
    /// Never complete a write.
    stall: bool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    pub fn failing_after(mut self, bytes: usize) -> Self {
        self.fail_after = Some(bytes);
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn accepted(&self) -> Vec<u8> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.stall {
            return Poll::Pending;
        }
        *self.calls.lock().unwrap() += 1;

        let mut accepted = self.accepted.lock().unwrap();
        let mut n = buf.len();
        if let Some(limit) = self.fail_after {
            let room = limit.saturating_sub(accepted.len());
            if room == 0 {
                return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
            }
            n = n.min(room);
        }
        if let Some(max_chunk) = self.max_chunk {
            n = n.min(max_chunk);
        }
        accepted.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[derive(Default)]
struct TransportState {
    sessions: VecDeque<(ScriptedReader, RecordingWriter)>,
    live: usize,
    max_live: usize,
    released: usize,
    fail_close: bool,
    stall_close: bool,
}

/// Transport handing out scripted endpoints in order.
///
/// Opening with no scripted endpoints left fails as if the peer were absent.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
    pub log: EventLog,
}

impl ScriptedTransport {
    pub fn new(log: &EventLog) -> Self {
        Self {
            state: Arc::default(),
            log: log.clone(),
        }
    }

    pub fn push_session(&self, reader: ScriptedReader, writer: RecordingWriter) {
        self.state.lock().unwrap().sessions.push_back((reader, writer));
    }

    pub fn fail_close(&self) {
        self.state.lock().unwrap().fail_close = true;
    }

    /// Make `close` count the release, then never complete.
    pub fn stall_close(&self) {
        self.state.lock().unwrap().stall_close = true;
    }

    /// Connections opened and not yet released.
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live
    }

    pub fn max_live(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    pub fn released(&self) -> usize {
        self.state.lock().unwrap().released
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Reader = ScriptedReader;
    type Writer = RecordingWriter;

    async fn open(&self, peer: &PeerId) -> Result<(Self::Reader, Self::Writer), OpenError> {
        let mut state = self.state.lock().unwrap();
        let Some(endpoints) = state.sessions.pop_front() else {
            return Err(OpenError::new(peer.clone(), io::ErrorKind::NotFound.into()));
        };
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        self.log.push(format!("open {peer}"));
        Ok(endpoints)
    }

    async fn close(
        &self,
        connection: Connection<Self::Reader, Self::Writer>,
    ) -> Result<(), CloseError> {
        let (fail, stall) = {
            let mut state = self.state.lock().unwrap();
            state.live -= 1;
            state.released += 1;
            (state.fail_close, state.stall_close)
        };
        self.log.push(format!("close {}", connection.peer));
        if stall {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(CloseError {
                peer: connection.peer,
                source: io::ErrorKind::Other.into(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
