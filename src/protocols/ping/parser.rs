//! Ping line parser.

use bytes::BytesMut;

/// Parsed ping command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Simple ping (no message).
    Ping,
    /// Ping with a message to echo back.
    PingMsg(&'a [u8]),
    /// Anything else.
    Unknown,
}

/// Split a received chunk into lines, dropping `\r\n` / `\n` terminators.
///
/// A trailing terminator does not produce an empty final line.
pub fn lines(input: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = input.strip_suffix(b"\n").unwrap_or(input);
    body.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Parse one line (without terminator), case-insensitively.
pub fn parse(line: &[u8]) -> Command<'_> {
    if line.eq_ignore_ascii_case(b"PING") {
        Command::Ping
    } else if line.len() > 5 && line[..5].eq_ignore_ascii_case(b"PING ") {
        Command::PingMsg(&line[5..])
    } else {
        Command::Unknown
    }
}

/// Format a PONG response.
pub fn response_pong() -> &'static [u8] {
    b"PONG\r\n"
}

/// Append a PONG response with message.
pub fn response_pong_msg(msg: &[u8], output: &mut BytesMut) {
    output.reserve(5 + msg.len() + 2); // "PONG " + msg + "\r\n"
    output.extend_from_slice(b"PONG ");
    output.extend_from_slice(msg);
    output.extend_from_slice(b"\r\n");
}

/// Format an error response.
pub fn response_error() -> &'static [u8] {
    b"ERROR unknown command\r\n"
}
