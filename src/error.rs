//! Error types for ringwire.

use thiserror::Error;

/// Failure reported by [`RingBuffer`](crate::queue::RingBuffer) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was disposed and no longer accepts operations.
    #[error("queue disposed")]
    Disposed,
}

/// Main error type for all ringwire operations.
#[derive(Debug, Error)]
pub enum RingwireError {
    /// I/O error on the connection or listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed command line, bad PUT length, or undecodable frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The shared queue refused the operation.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Unsupported version token, or the server refused ours.
    #[error("Handshake failed for version token {}", String::from_utf8_lossy(.0))]
    Handshake([u8; 3]),

    /// The server answered with an Error frame.
    #[error("Server error: {0}")]
    Remote(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl RingwireError {
    /// Whether this error means the shared queue has been disposed.
    pub fn is_disposed(&self) -> bool {
        matches!(self, RingwireError::Queue(QueueError::Disposed))
    }
}

/// Result type alias using RingwireError.
pub type Result<T> = std::result::Result<T, RingwireError>;
