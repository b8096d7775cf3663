//! Request decoding.
//!
//! Clients send newline-terminated ASCII command lines:
//!
//! ```text
//! PUT <4 raw bytes, i32 BE length>\n<length raw bytes>
//! GET\n
//! FIN\n
//! ```
//!
//! The PUT length is raw binary, so it may itself contain `\n` or space
//! bytes. It is therefore taken positionally: the 4 bytes right after
//! `PUT ` followed by `\n`. The payload follows immediately with no
//! delimiter.
//!
//! [`CommandBuffer`] runs the same two-state machine as the reply-side
//! [`FrameBuffer`](super::FrameBuffer):
//! - `WaitingForLine`: need a full command line
//! - `WaitingForBody`: PUT line parsed, need `length` more bytes

use bytes::{Bytes, BytesMut};

use crate::error::{RingwireError, Result};

/// Default maximum command line size (16 KiB).
pub const DEFAULT_MAX_LINE_SIZE: usize = 16 * 1024;

/// Default maximum PUT payload size (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

/// Length of the raw PUT length argument.
pub const PUT_LENGTH_LEN: usize = 4;

const PUT_PREFIX: &[u8] = b"PUT ";

/// `PUT ` + length + `\n`.
const PUT_LINE_LEN: usize = PUT_PREFIX.len() + PUT_LENGTH_LEN + 1;

/// Shortest accepted command line, newline excluded.
const MIN_LINE_LEN: usize = 2;

/// Bodies up to this size get their own allocation instead of pinning the
/// read buffer while they sit in the queue.
const COPY_BODY_THRESHOLD: usize = 4 * 1024;

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enqueue `body` (exactly `length` bytes).
    Put { length: u32, body: Bytes },
    /// Dequeue one payload.
    Get,
    /// End the session.
    Fin,
    /// Unrecognized command line (without the newline).
    Unknown(Bytes),
}

impl Command {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Put { .. } => "PUT",
            Command::Get => "GET",
            Command::Fin => "FIN",
            Command::Unknown(_) => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForLine,
    WaitingForBody { length: u32 },
}

/// Accumulates bytes read from a session and yields commands in order.
///
/// # Example
///
/// ```
/// use ringwire::protocol::{Command, CommandBuffer};
///
/// let mut buffer = CommandBuffer::new();
/// buffer.extend(b"PUT \x00\x00\x00\x08\nshikanonGET\n");
///
/// assert!(matches!(buffer.next_command().unwrap(), Some(Command::Put { length: 8, .. })));
/// assert_eq!(buffer.next_command().unwrap(), Some(Command::Get));
/// assert_eq!(buffer.next_command().unwrap(), None);
/// ```
pub struct CommandBuffer {
    buffer: BytesMut,
    state: State,
    max_line_size: usize,
    max_payload_size: u32,
}

impl CommandBuffer {
    /// Create a buffer with the default line and payload limits.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_LINE_SIZE, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a buffer with custom limits.
    pub fn with_limits(max_line_size: usize, max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_line_size),
            state: State::WaitingForLine,
            max_line_size,
            max_payload_size,
        }
    }

    /// Append bytes read from the connection.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete command.
    ///
    /// Returns:
    /// - `Ok(Some(command))` if a command is complete
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a malformed line; the stream cannot be resynchronized
    pub fn next_command(&mut self) -> Result<Option<Command>> {
        match self.state {
            State::WaitingForLine => self.next_line(),
            State::WaitingForBody { length } => {
                let length_usize = length as usize;
                if self.buffer.len() < length_usize {
                    return Ok(None);
                }

                let body = if length_usize <= COPY_BODY_THRESHOLD {
                    let body = Bytes::copy_from_slice(&self.buffer[..length_usize]);
                    let _ = self.buffer.split_to(length_usize);
                    body
                } else {
                    self.buffer.split_to(length_usize).freeze()
                };
                self.state = State::WaitingForLine;
                Ok(Some(Command::Put { length, body }))
            }
        }
    }

    fn next_line(&mut self) -> Result<Option<Command>> {
        if self.buffer.starts_with(PUT_PREFIX) {
            return self.put_line();
        }

        let Some(end) = self.buffer.iter().position(|&b| b == b'\n') else {
            if self.buffer.len() >= self.max_line_size {
                return Err(self.line_too_long());
            }
            return Ok(None);
        };
        if end >= self.max_line_size {
            return Err(self.line_too_long());
        }

        if end < MIN_LINE_LEN {
            return Err(RingwireError::Protocol(format!(
                "Command line of {} bytes is shorter than {}",
                end, MIN_LINE_LEN
            )));
        }

        let line = self.buffer.split_to(end + 1).freeze().slice(..end);
        let name = match line.iter().position(|&b| b == b' ') {
            Some(space) => &line[..space],
            None => &line[..],
        };

        let command = match name {
            b"GET" => Command::Get,
            b"FIN" => Command::Fin,
            b"PUT" => {
                return Err(RingwireError::Protocol(
                    "PUT requires a 4-byte length argument".to_string(),
                ))
            }
            _ => Command::Unknown(line.clone()),
        };
        Ok(Some(command))
    }

    fn put_line(&mut self) -> Result<Option<Command>> {
        if self.buffer.len() < PUT_LINE_LEN {
            self.check_partial_length()?;
            return Ok(None);
        }

        if self.buffer[PUT_LINE_LEN - 1] != b'\n' {
            return Err(RingwireError::Protocol(
                "PUT length must be exactly 4 bytes followed by a newline".to_string(),
            ));
        }

        let start = PUT_PREFIX.len();
        let raw = [
            self.buffer[start],
            self.buffer[start + 1],
            self.buffer[start + 2],
            self.buffer[start + 3],
        ];
        let length = i32::from_be_bytes(raw);
        if length < 0 {
            return Err(RingwireError::Protocol(format!(
                "Invalid PUT length {}",
                length
            )));
        }

        let length = length as u32;
        if length > self.max_payload_size {
            return Err(RingwireError::Protocol(format!(
                "PUT length {} exceeds maximum {}",
                length, self.max_payload_size
            )));
        }

        let _ = self.buffer.split_to(PUT_LINE_LEN);
        self.state = State::WaitingForBody { length };
        self.next_command()
    }

    /// Reject a PUT as soon as the length bytes received so far cannot
    /// make up an acceptable length, whatever bytes follow.
    fn check_partial_length(&self) -> Result<()> {
        let start = PUT_PREFIX.len();
        let end = self.buffer.len().min(start + PUT_LENGTH_LEN);
        let received = &self.buffer[start..end];

        let Some(&first) = received.first() else {
            return Ok(());
        };
        if first & 0x80 != 0 {
            return Err(RingwireError::Protocol(
                "Invalid PUT length: sign bit set".to_string(),
            ));
        }

        // Missing low-order bytes taken as zero.
        let smallest = (0..PUT_LENGTH_LEN).fold(0u64, |acc, i| {
            (acc << 8) | u64::from(received.get(i).copied().unwrap_or(0))
        });
        if smallest > u64::from(self.max_payload_size) {
            return Err(RingwireError::Protocol(format!(
                "PUT length of at least {} exceeds maximum {}",
                smallest, self.max_payload_size
            )));
        }
        Ok(())
    }

    fn line_too_long(&self) -> RingwireError {
        RingwireError::Protocol(format!(
            "Command line exceeds maximum of {} bytes",
            self.max_line_size
        ))
    }

    /// Number of buffered bytes not yet turned into commands.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}
