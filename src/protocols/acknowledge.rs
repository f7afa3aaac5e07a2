//! Acknowledge transform.
//!
//! ```text
//! Received: ping
//! Response: Hello from the host! You said: 'ping'
//! ```
//!
//! The raw message bytes are placed between the prefix and suffix, without
//! decoding, so distinct messages always produce distinct responses even when
//! they are not valid UTF-8.

use super::Transform;
use bytes::{Bytes, BytesMut};

pub const DEFAULT_PREFIX: &str = "Hello from the host! You said: '";
pub const DEFAULT_SUFFIX: &str = "'";

#[derive(Debug, Clone)]
pub struct Acknowledge {
    prefix: Bytes,
    suffix: Bytes,
}

impl Acknowledge {
    pub fn new(prefix: &[u8], suffix: &[u8]) -> Self {
        Self {
            prefix: Bytes::copy_from_slice(prefix),
            suffix: Bytes::copy_from_slice(suffix),
        }
    }
}

impl Default for Acknowledge {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX.as_bytes(), DEFAULT_SUFFIX.as_bytes())
    }
}

impl Transform for Acknowledge {
    fn respond(&self, message: &[u8]) -> Bytes {
        let capacity = self.prefix.len() + message.len() + self.suffix.len();
        let mut resp = BytesMut::with_capacity(capacity);
        resp.extend_from_slice(&self.prefix);
        resp.extend_from_slice(message);
        resp.extend_from_slice(&self.suffix);
        resp.freeze()
    }

    fn name(&self) -> &'static str {
        "acknowledge"
    }
}
