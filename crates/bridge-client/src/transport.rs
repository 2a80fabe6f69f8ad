//! Newline-delimited JSON framing and the request/response exchange.
//!
//! A request is one JSON object, `{"type": <command>, "params": {...}}`,
//! followed by a single `\n`. The reply is one JSON value terminated the same
//! way. JSON string escaping guarantees payloads never contain a raw newline,
//! so the delimiter is unambiguous.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::TransportError;

/// Largest response frame accepted before giving up on finding a delimiter.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Smallest timeout applied to sockets; zero would mean "block forever".
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Largest timeout honoured; longer requests wait this long instead.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

const READ_CHUNK_BYTES: usize = 4096;
const FRAME_DELIMITER: u8 = b'\n';
const TRANSPORT_TARGET: &str = "unity_bridge::transport";

/// A byte stream that frames can be exchanged over.
///
/// Implemented for [`TcpStream`]; tests substitute scripted streams.
pub trait FrameStream: Read + Write {
    /// Bounds how long the next read may block.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the timeout cannot be applied.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl FrameStream for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }
}

/// A command ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    params: Map<String, Value>,
}

impl Command {
    /// Builds a command from a name and an ordered parameter object.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Command name as it will be sent.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters in insertion order.
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

#[derive(Serialize)]
struct RequestFrame<'a> {
    #[serde(rename = "type")]
    command: &'a str,
    params: &'a Map<String, Value>,
}

/// Clamps a caller-supplied timeout into [`MIN_TIMEOUT`]`..=`[`MAX_TIMEOUT`].
#[must_use]
pub fn effective_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT)
}

/// Serialises a command into a complete frame, delimiter included.
///
/// # Errors
///
/// Returns [`TransportError::Serialise`] when serialisation fails.
pub fn encode_request(command: &Command) -> Result<Vec<u8>, TransportError> {
    let frame = RequestFrame {
        command: command.name(),
        params: command.params(),
    };
    let mut bytes = serde_json::to_vec(&frame).map_err(TransportError::Serialise)?;
    bytes.push(FRAME_DELIMITER);
    Ok(bytes)
}

/// Writes one request frame in a single operation and flushes it.
///
/// # Errors
///
/// Returns [`TransportError::SendFailed`] on any write error.
pub fn write_request<W>(writer: &mut W, command: &Command) -> Result<(), TransportError>
where
    W: Write + ?Sized,
{
    let frame = encode_request(command)?;
    writer
        .write_all(&frame)
        .map_err(TransportError::SendFailed)?;
    writer.flush().map_err(TransportError::SendFailed)
}

/// Reads one response frame and parses it as JSON.
///
/// The whole read shares one deadline of `timeout`; each socket read is
/// bounded by whatever remains of it.
///
/// # Errors
///
/// Returns [`TransportError::Timeout`] when the deadline passes,
/// [`TransportError::ConnectionClosed`] when the peer closes first,
/// [`TransportError::FrameTooLarge`] when no delimiter appears within
/// [`MAX_FRAME_BYTES`], and decoding errors for invalid payloads.
pub fn read_response<S>(stream: &mut S, timeout: Duration) -> Result<Value, TransportError>
where
    S: FrameStream + ?Sized,
{
    let budget = effective_timeout(timeout);
    let started = Instant::now();
    let deadline = started.checked_add(budget).unwrap_or(started);
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK_BYTES);
    let mut chunk = [0_u8; READ_CHUNK_BYTES];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout { after: budget });
        }
        stream
            .set_read_timeout(Some(effective_timeout(remaining)))
            .map_err(TransportError::ReceiveFailed)?;

        let read = match stream.read(&mut chunk) {
            Ok(0) => return Err(TransportError::ConnectionClosed),
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) if is_timeout(&error) => {
                return Err(TransportError::Timeout { after: budget });
            }
            Err(error) => return Err(TransportError::ReceiveFailed(error)),
        };

        let scanned = buffer.len();
        buffer.extend(chunk.iter().take(read));
        if let Some(offset) = buffer
            .iter()
            .skip(scanned)
            .position(|byte| *byte == FRAME_DELIMITER)
        {
            let end = scanned + offset;
            let trailing = buffer.len() - end - 1;
            if trailing > 0 {
                warn!(
                    target: TRANSPORT_TARGET,
                    bytes = trailing,
                    "discarding bytes received after the response frame"
                );
            }
            buffer.truncate(end);
            return decode_response(&buffer);
        }
        if buffer.len() > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                limit: MAX_FRAME_BYTES,
            });
        }
    }
}

/// Decodes a frame body (delimiter excluded) into a JSON value.
///
/// Surrounding whitespace, including a trailing `\r`, is ignored.
///
/// # Errors
///
/// Returns [`TransportError::InvalidUtf8`] or
/// [`TransportError::MalformedResponse`].
pub fn decode_response(frame: &[u8]) -> Result<Value, TransportError> {
    let text = std::str::from_utf8(frame).map_err(TransportError::InvalidUtf8)?;
    serde_json::from_str(text.trim()).map_err(TransportError::MalformedResponse)
}

/// Sends `command` and waits for its reply.
///
/// Strictly one request is in flight: the reply read here is, by protocol
/// ordering alone, the reply to this request.
///
/// # Errors
///
/// Any [`TransportError`]; the stream must not be reused afterwards.
pub fn exchange<S>(
    stream: &mut S,
    command: &Command,
    timeout: Duration,
) -> Result<Value, TransportError>
where
    S: FrameStream + ?Sized,
{
    write_request(stream, command)?;
    read_response(stream, timeout)
}

fn is_timeout(error: &io::Error) -> bool {
    // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut.
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
