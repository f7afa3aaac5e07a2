//! Response transforms.
//!
//! A transform is a pure function from one received message to the bytes
//! written back. The communication loop knows nothing else about message
//! content, so a real framer can replace these without touching the loop.
//!
//! ## Built-in transforms
//! - `acknowledge`: wraps the message in a fixed prefix/suffix (default)
//! - `echo`: returns the message unchanged
//! - `ping`: answers `PING` lines with `PONG`

pub mod acknowledge;
pub mod echo;
pub mod ping;

use crate::config::{Config, TransformKind};
use bytes::Bytes;
use std::sync::Arc;

pub use acknowledge::Acknowledge;
pub use echo::Echo;
pub use ping::Ping;

/// Derives the response to one received message.
///
/// Implementations must be deterministic: the same message always yields the
/// same response.
pub trait Transform: Send + Sync {
    fn respond(&self, message: &[u8]) -> Bytes;

    fn name(&self) -> &'static str;
}

/// Build the transform selected in the configuration.
pub fn build(config: &Config) -> Arc<dyn Transform> {
    match config.transform {
        TransformKind::Acknowledge => Arc::new(Acknowledge::new(
            config.ack_prefix.as_bytes(),
            config.ack_suffix.as_bytes(),
        )),
        TransformKind::Echo => Arc::new(Echo),
        TransformKind::Ping => Arc::new(Ping),
    }
}
