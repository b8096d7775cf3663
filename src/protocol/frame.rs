//! Frame struct with typed accessors.
//!
//! Uses `bytes::Bytes` for zero-copy body sharing.
//!
//! # Example
//!
//! ```
//! use ringwire::protocol::{Frame, FrameType};
//! use bytes::Bytes;
//!
//! let frame = Frame::response(Bytes::from_static(b"shikanon"));
//! assert_eq!(frame.frame_type(), FrameType::Response);
//! assert_eq!(frame.encode(), b"\x00\x00\x00\x0c\x00\x00\x00\x01shikanon");
//! ```

use bytes::Bytes;

use super::wire_format::{FrameHeader, FrameType, FRAME_HEADER_SIZE};
use crate::error::{RingwireError, Result};

/// A complete reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl Frame {
    /// Create a frame of the given type around `body`.
    pub fn new(frame_type: FrameType, body: Bytes) -> Self {
        Self {
            header: FrameHeader::new(frame_type, body.len() as u32),
            body,
        }
    }

    /// Error frame carrying a description of the failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FrameType::Error, Bytes::from(message.into()))
    }

    /// Response frame carrying a dequeued payload.
    pub fn response(body: Bytes) -> Self {
        Self::new(FrameType::Response, body)
    }

    /// Message frame (reserved for unsolicited pushes).
    pub fn message(body: Bytes) -> Self {
        Self::new(FrameType::Message, body)
    }

    #[inline]
    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.frame_type == FrameType::Error
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Turn the frame into the payload it carries.
    ///
    /// Error frames become [`RingwireError::Remote`] with the body as text.
    pub fn into_result(self) -> Result<Bytes> {
        match self.header.frame_type {
            FrameType::Error => Err(RingwireError::Remote(
                String::from_utf8_lossy(&self.body).into_owned(),
            )),
            FrameType::Response | FrameType::Message => Ok(self.body),
        }
    }

    /// Encode header and body into one contiguous buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + self.body.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.body);
        buf
    }
}
