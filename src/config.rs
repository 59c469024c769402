//! Configuration for redwire
//!
//! Centralized connection configuration with sensible defaults.

use std::time::Duration;

use crate::error::{RedwireError, Result};
use crate::protocol::{DecoderLimits, EncodingErrors, TextEncoding};

/// Main configuration for a redwire connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Server address (host:port)
    pub addr: String,

    /// Dial timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Idle timeout (milliseconds, 0 = disabled)
    /// Reset by every inbound byte; expiry fails all pending requests.
    pub idle_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = disabled)
    pub write_timeout_ms: u64,

    /// Size of the receive thread's read buffer
    pub read_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Encoding Configuration
    // -------------------------------------------------------------------------
    /// Text encoding applied to string arguments
    pub encoding: TextEncoding,

    /// What to do with characters the encoding cannot represent
    pub encoding_errors: EncodingErrors,

    // -------------------------------------------------------------------------
    // Decoder Configuration
    // -------------------------------------------------------------------------
    /// Largest accepted bulk string payload (bytes)
    pub max_bulk_len: usize,

    /// Largest accepted array element count
    pub max_array_len: usize,

    /// Longest accepted status, error, integer or length line (bytes)
    pub max_line_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            connect_timeout_ms: 5000,
            idle_timeout_ms: 0,
            write_timeout_ms: 5000,
            read_buffer_size: 16 * 1024,
            encoding: TextEncoding::Utf8,
            encoding_errors: EncodingErrors::Strict,
            max_bulk_len: 512 * 1024 * 1024, // 512 MB
            max_array_len: 16 * 1024 * 1024,
            max_line_len: 64 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the connection cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.addr.is_empty() {
            return Err(RedwireError::Config("address must not be empty".to_string()));
        }
        if self.read_buffer_size == 0 {
            return Err(RedwireError::Config(
                "read buffer size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        millis(self.idle_timeout_ms)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }

    /// Decoder limits derived from this config
    pub fn decoder_limits(&self) -> DecoderLimits {
        DecoderLimits {
            max_bulk_len: self.max_bulk_len,
            max_array_len: self.max_array_len,
            max_line_len: self.max_line_len,
        }
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address (host:port)
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the dial timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the idle timeout (in milliseconds, 0 disables it)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the read buffer size (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the text encoding for string arguments
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    /// Set the handling of unencodable characters
    pub fn encoding_errors(mut self, errors: EncodingErrors) -> Self {
        self.config.encoding_errors = errors;
        self
    }

    /// Set the bulk payload limit (in bytes)
    pub fn max_bulk_len(mut self, len: usize) -> Self {
        self.config.max_bulk_len = len;
        self
    }

    /// Set the array element limit
    pub fn max_array_len(mut self, len: usize) -> Self {
        self.config.max_array_len = len;
        self
    }

    /// Set the line length limit (in bytes)
    pub fn max_line_len(mut self, len: usize) -> Self {
        self.config.max_line_len = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
