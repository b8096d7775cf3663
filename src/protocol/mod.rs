//! Protocol module - handshake, request decoding, and reply framing.
//!
//! This module implements the byte-level protocol:
//! - 3-byte version handshake answered by a 2-byte acknowledgement
//! - Newline-terminated command lines (`PUT`, `GET`, `FIN`)
//! - 8-byte-header reply frames with typed accessors

mod command;
mod frame;
mod frame_buffer;
mod handshake;
mod wire_format;

pub use command::{
    Command, CommandBuffer, DEFAULT_MAX_LINE_SIZE, DEFAULT_MAX_PAYLOAD_SIZE, PUT_LENGTH_LEN,
};
pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use handshake::{ProtocolVersion, HANDSHAKE_ACK, VERSION_LEN, VERSION_V01};
pub use wire_format::{
    FrameHeader, FrameType, DEFAULT_MAX_BODY_SIZE, FRAME_HEADER_SIZE, SIZE_FIELD_LEN,
    TYPE_FIELD_LEN,
};
