//! Wire format encoding and decoding.
//!
//! Every server reply is a frame with an 8-byte header:
//! ```text
//! ┌──────────┬──────────┬──────────────┐
//! │ Size     │ Type     │ Body         │
//! │ 4 bytes  │ 4 bytes  │ size-4 bytes │
//! │ uint32 BE│ uint32 BE│              │
//! └──────────┴──────────┴──────────────┘
//! ```
//!
//! `size` counts the type field plus the body, not itself, so the body
//! length is always `size - 4`.

use crate::error::{RingwireError, Result};

/// Length of the `size` field.
pub const SIZE_FIELD_LEN: usize = 4;

/// Length of the `type` field.
pub const TYPE_FIELD_LEN: usize = 4;

/// Header size in bytes (fixed, exactly 8).
pub const FRAME_HEADER_SIZE: usize = SIZE_FIELD_LEN + TYPE_FIELD_LEN;

/// Default maximum frame body size (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: u32 = 1024 * 1024;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FrameType {
    /// Body is UTF-8 error text.
    Error = 0,
    /// Body is a dequeued payload.
    Response = 1,
    /// Reserved for unsolicited server pushes.
    Message = 2,
}

impl FrameType {
    /// Wire value of this type.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Parse a wire value.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(FrameType::Error),
            1 => Ok(FrameType::Response),
            2 => Ok(FrameType::Message),
            other => Err(RingwireError::Protocol(format!(
                "Unknown frame type {}",
                other
            ))),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Body length + 4.
    pub size: u32,
    pub frame_type: FrameType,
}

impl FrameHeader {
    /// Header for a body of `body_len` bytes.
    pub fn new(frame_type: FrameType, body_len: u32) -> Self {
        Self {
            size: body_len + TYPE_FIELD_LEN as u32,
            frame_type,
        }
    }

    /// Body length implied by `size`.
    #[inline]
    pub fn body_len(&self) -> u32 {
        self.size - TYPE_FIELD_LEN as u32
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use ringwire::protocol::{FrameHeader, FrameType};
    ///
    /// let header = FrameHeader::new(FrameType::Response, 8);
    /// assert_eq!(header.encode(), [0, 0, 0, 12, 0, 0, 0, 1]);
    /// ```
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[..SIZE_FIELD_LEN].copy_from_slice(&self.size.to_be_bytes());
        buf[SIZE_FIELD_LEN..].copy_from_slice(&self.frame_type.as_u32().to_be_bytes());
        buf
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `Ok(None)` if the buffer is too short, and a protocol error
    /// for a `size` below 4 or an unknown type tag.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if size < TYPE_FIELD_LEN as u32 {
            return Err(RingwireError::Protocol(format!(
                "Frame size {} is smaller than the type field",
                size
            )));
        }

        let frame_type = FrameType::from_u32(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]))?;
        Ok(Some(Self { size, frame_type }))
    }

    /// Reject bodies above `max_body_size`.
    pub fn validate(&self, max_body_size: u32) -> Result<()> {
        if self.body_len() > max_body_size {
            return Err(RingwireError::Protocol(format!(
                "Frame body size {} exceeds maximum {}",
                self.body_len(),
                max_body_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_counts_body_plus_type_field() {
        let header = FrameHeader::new(FrameType::Response, 8);
        assert_eq!(header.size, 12);
        assert_eq!(header.body_len(), 8);

        let empty = FrameHeader::new(FrameType::Error, 0);
        assert_eq!(empty.size, 4);
        assert_eq!(empty.body_len(), 0);
    }

    #[test]
    fn test_header_big_endian_byte_order() {
        let header = FrameHeader {
            size: 0x0102_0304,
            frame_type: FrameType::Message,
        };
        assert_eq!(header.encode(), [0x01, 0x02, 0x03, 0x04, 0, 0, 0, 2]);
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(FrameType::Error.as_u32(), 0);
        assert_eq!(FrameType::Response.as_u32(), 1);
        assert_eq!(FrameType::Message.as_u32(), 2);
        assert_eq!(FrameType::from_u32(1).unwrap(), FrameType::Response);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = FrameType::from_u32(3).unwrap_err();
        assert!(err.to_string().contains("Unknown frame type 3"));

        let bytes = [0, 0, 0, 4, 0, 0, 0, 9];
        assert!(FrameHeader::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 7];
        assert!(FrameHeader::decode(&buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_size_below_type_field() {
        let bytes = [0, 0, 0, 3, 0, 0, 0, 1];
        let err = FrameHeader::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("smaller than the type field"));
    }

    #[test]
    fn test_decode_reads_encoded_header() {
        let header = FrameHeader::new(FrameType::Error, 17);
        let decoded = FrameHeader::decode(&header.encode()).unwrap().unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_validate_body_too_large() {
        let header = FrameHeader::new(FrameType::Response, 1_000);
        assert!(header.validate(1_000).is_ok());

        let err = header.validate(999).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }
}
