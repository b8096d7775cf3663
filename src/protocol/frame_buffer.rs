//! Frame buffer for accumulating partial reads of server replies.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 8 bytes
//! - `WaitingForBody`: Header parsed, need `size - 4` more bytes

use bytes::{Bytes, BytesMut};

use super::wire_format::{FrameHeader, DEFAULT_MAX_BODY_SIZE, FRAME_HEADER_SIZE};
use super::Frame;
use crate::error::Result;

#[derive(Debug, Clone)]
enum State {
    WaitingForHeader,
    WaitingForBody { header: FrameHeader },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_body_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default 1 MiB body limit.
    pub fn new() -> Self {
        Self::with_max_body(DEFAULT_MAX_BODY_SIZE)
    }

    /// Create a new frame buffer with a custom body limit.
    pub fn with_max_body(max_body_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
            max_body_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error on an undecodable header or an oversized body.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(header) = FrameHeader::decode(&self.buffer)? else {
                    return Ok(None);
                };
                header.validate(self.max_body_size)?;

                let _ = self.buffer.split_to(FRAME_HEADER_SIZE);

                if header.body_len() == 0 {
                    return Ok(Some(Frame {
                        header,
                        body: Bytes::new(),
                    }));
                }

                self.state = State::WaitingForBody { header };
                self.try_extract_one()
            }

            State::WaitingForBody { header } => {
                let body_len = header.body_len() as usize;
                if self.buffer.len() < body_len {
                    return Ok(None);
                }

                let body = self.buffer.split_to(body_len).freeze();
                let header = *header;
                self.state = State::WaitingForHeader;

                Ok(Some(Frame { header, body }))
            }
        }
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameType;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let bytes = Frame::response(Bytes::from_static(b"shikanon")).encode();

        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type(), FrameType::Response);
        assert_eq!(frames[0].body(), b"shikanon");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = Frame::response(Bytes::from_static(b"first")).encode();
        combined.extend(Frame::error("second").encode());
        combined.extend(Frame::response(Bytes::new()).encode());

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].body(), b"first");
        assert!(frames[1].is_error());
        assert!(frames[2].body().is_empty());
    }

    #[test]
    fn test_fragmented_header_and_body() {
        let mut buffer = FrameBuffer::new();
        let bytes = Frame::response(Bytes::from_static(b"fragmented body")).encode();

        assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        assert!(buffer.push(&bytes[3..FRAME_HEADER_SIZE + 4]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForBody");

        let frames = buffer.push(&bytes[FRAME_HEADER_SIZE + 4..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].body(), b"fragmented body");
        assert_eq!(buffer.state_name(), "WaitingForHeader");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = Frame::error("nope").encode();

        let mut all_frames = Vec::new();
        for byte in &bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].body(), b"nope");
    }

    #[test]
    fn test_max_body_validation() {
        let mut buffer = FrameBuffer::with_max_body(4);
        let bytes = Frame::response(Bytes::from_static(b"too long")).encode();

        let err = buffer.push(&bytes).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_unknown_type_is_error() {
        let mut buffer = FrameBuffer::new();
        let err = buffer.push(&[0, 0, 0, 4, 0, 0, 0, 7]).unwrap_err();
        assert!(err.to_string().contains("Unknown frame type"));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let bytes = Frame::response(Bytes::from_static(b"abc")).encode();
        buffer.push(&bytes[..FRAME_HEADER_SIZE + 1]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForBody");
        assert_eq!(buffer.len(), 1);

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
    }
}
