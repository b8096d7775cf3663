//! Connection handshake constants.
//!
//! A client opens with exactly [`VERSION_LEN`] bytes naming the protocol
//! version. A recognized version is acknowledged with the two literal bytes
//! [`HANDSHAKE_ACK`] (no frame header); anything else gets the connection
//! closed without a single byte written.

/// Length of the version token.
pub const VERSION_LEN: usize = 3;

/// Current protocol version token.
pub const VERSION_V01: [u8; VERSION_LEN] = *b"v01";

/// Acknowledgement sent for a recognized version.
pub const HANDSHAKE_ACK: [u8; 2] = *b"ok";

/// Protocol versions this server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V01,
}

impl ProtocolVersion {
    /// Match a version token, returning `None` when unsupported.
    pub fn from_token(token: &[u8; VERSION_LEN]) -> Option<Self> {
        match token {
            b"v01" => Some(ProtocolVersion::V01),
            _ => None,
        }
    }

    /// Token that announces this version.
    pub fn token(self) -> [u8; VERSION_LEN] {
        match self {
            ProtocolVersion::V01 => VERSION_V01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_token() {
        assert_eq!(ProtocolVersion::from_token(b"v01"), Some(ProtocolVersion::V01));
        assert_eq!(ProtocolVersion::V01.token(), VERSION_V01);
    }

    #[test]
    fn test_unknown_tokens() {
        assert_eq!(ProtocolVersion::from_token(b"v02"), None);
        assert_eq!(ProtocolVersion::from_token(b"V01"), None);
        assert_eq!(ProtocolVersion::from_token(b"\0\0\0"), None);
    }

    #[test]
    fn test_ack_is_two_literal_bytes() {
        assert_eq!(&HANDSHAKE_ACK, b"ok");
    }
}
