//! Server and session configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! { "listen_addr": "0.0.0.0:9000", "capacity": 4096, "backpressure": "log" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backpressure::BackpressureMode;
use crate::error::Result;
use crate::protocol::{DEFAULT_MAX_LINE_SIZE, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::queue::DEFAULT_SPIN_LIMIT;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8888";

/// Default requested queue capacity.
pub const DEFAULT_CAPACITY: u64 = 1024;

/// Acceptor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub listen_addr: String,
    /// Requested queue capacity, rounded up to a power of two.
    pub capacity: u64,
    /// Longest command line accepted without a newline.
    pub max_line_size: usize,
    /// Largest PUT payload accepted.
    pub max_payload_size: u32,
    /// Failed slot attempts between yields.
    pub spin_limit: u32,
    pub backpressure: BackpressureMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            capacity: DEFAULT_CAPACITY,
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            spin_limit: DEFAULT_SPIN_LIMIT,
            backpressure: BackpressureMode::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Per-connection limits derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_line_size: self.max_line_size,
            max_payload_size: self.max_payload_size,
        }
    }
}

/// Limits applied to each connection's request decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub max_line_size: usize,
    pub max_payload_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8888");
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.max_line_size, 16 * 1024);
        assert_eq!(config.max_payload_size, 1024 * 1024);
        assert_eq!(config.spin_limit, 10_000);
        assert_eq!(config.backpressure, BackpressureMode::Dispose);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = ServerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config =
            ServerConfig::from_json_str(r#"{"capacity": 64, "backpressure": "log"}"#).unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.backpressure, BackpressureMode::Log);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_invalid_json() {
        let err = ServerConfig::from_json_str(r#"{"capacity": "lots"}"#).unwrap_err();
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"listen_addr": "0.0.0.0:9000", "max_line_size": 128}}"#).unwrap();

        let config = ServerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.session_config().max_line_size, 128);
        assert_eq!(config.session_config().max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, crate::error::RingwireError::Io(_)));
    }
}
