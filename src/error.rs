//! # Error Types
//!
//! Custom error types for tello-pilot using `thiserror`.

use thiserror::Error;

/// Main error type for tello-pilot
#[derive(Debug, Error)]
pub enum TelloPilotError {
    /// Socket setup or I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed inbound frame (bad magic, short buffer, CRC mismatch)
    #[error("frame error: {0}")]
    Framing(String),

    /// Record byte slice shorter than the record's declared layout
    #[error("payload too short: need {expected} bytes, got {actual}")]
    ShortPayload { expected: usize, actual: usize },

    /// Flight-log payload whose first record fails the magic check
    #[error("corrupted flight log: {0}")]
    CorruptedLog(String),

    /// Negative PID gain or deadband
    #[error("invalid controller gains: {0}")]
    InvalidGains(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configured drone host is not a valid IP address
    #[error("invalid drone address: {0}")]
    Address(#[from] std::net::AddrParseError),
}

/// Result type alias for tello-pilot
pub type Result<T> = std::result::Result<T, TelloPilotError>;
