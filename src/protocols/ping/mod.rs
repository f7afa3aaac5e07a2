//! Ping transform.
//!
//! A minimal line protocol for health checks from the peer side:
//!
//! ```text
//! Received: PING\r\n
//! Response: PONG\r\n
//!
//! Received: PING hello\r\n
//! Response: PONG hello\r\n
//! ```
//!
//! A received chunk may hold several lines; each gets its own reply, in
//! order. A chunk without a line ending is treated as one line.

pub mod parser;

use super::Transform;
use bytes::{Bytes, BytesMut};
use parser::Command;

#[derive(Debug, Default, Clone, Copy)]
pub struct Ping;

impl Transform for Ping {
    fn respond(&self, message: &[u8]) -> Bytes {
        let mut resp = BytesMut::new();

        for line in parser::lines(message) {
            match parser::parse(line) {
                Command::Ping => resp.extend_from_slice(parser::response_pong()),
                Command::PingMsg(msg) => parser::response_pong_msg(msg, &mut resp),
                Command::Unknown => resp.extend_from_slice(parser::response_error()),
            }
        }

        resp.freeze()
    }

    fn name(&self) -> &'static str {
        "ping"
    }
}
