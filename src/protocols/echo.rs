//! Echo transform.
//!
//! Writes every received message back unchanged. Useful for throughput
//! testing and for checking data integrity from the peer side.

use super::Transform;
use bytes::Bytes;

#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl Transform for Echo {
    fn respond(&self, message: &[u8]) -> Bytes {
        Bytes::copy_from_slice(message)
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
