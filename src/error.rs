//! # Error Types
//!
//! Custom error types for the force sensor bridge using `thiserror`.

use std::fmt;

use thiserror::Error;

/// Which checksum a [`ForceSensorError::ChecksumMismatch`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// CRC-4 over the init marker and sequence counter
    Header,
    /// CRC-32 over the 47 payload bytes
    Payload,
}

impl fmt::Display for ChecksumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumKind::Header => write!(f, "header CRC-4"),
            ChecksumKind::Payload => write!(f, "payload CRC-32"),
        }
    }
}

/// Main error type for the force sensor bridge
#[derive(Debug, Error)]
pub enum ForceSensorError {
    /// No valid header found within the scan budget
    #[error("no frame header found after scanning {scanned} bytes")]
    SynchronizationTimeout { scanned: usize },

    /// Header or payload checksum did not match
    #[error("{kind} mismatch: expected 0x{expected:X}, got 0x{actual:X}")]
    ChecksumMismatch {
        kind: ChecksumKind,
        expected: u32,
        actual: u32,
    },

    /// Report ID byte not in the known set
    #[error("unknown report id 0x{0:02X}")]
    UnknownReportId(u8),

    /// Expected response bytes never arrived
    #[error("response timeout: expected {expected} bytes, {available} available")]
    ResponseTimeout { expected: usize, available: usize },

    /// Bounded retry loop completed without success
    #[error("gave up after {attempts} attempts")]
    AttemptsExhausted { attempts: usize },

    /// Frame read returned fewer bytes than the fixed frame length
    #[error("incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// CRC width/polynomial combination not supported
    #[error("invalid CRC parameters: {0}")]
    InvalidCrcParams(String),

    /// Byte responses are folded into a u32, so at most 4 bytes
    #[error("invalid response length {0} (must be 0-4)")]
    InvalidResponseLength(usize),

    /// Telemetry serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate device paths could be opened
    #[error("No sensor found at: {0}")]
    SerialPortNotFound(String),
}

impl ForceSensorError {
    /// Whether a bounded retry loop should try again after this error
    ///
    /// Lost synchronization and corrupted frames are transient on a noisy
    /// link. A malformed payload or an I/O failure is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ForceSensorError::SynchronizationTimeout { .. }
                | ForceSensorError::ChecksumMismatch { .. }
                | ForceSensorError::IncompleteFrame { .. }
        )
    }
}

/// Result type alias for the force sensor bridge
pub type Result<T> = std::result::Result<T, ForceSensorError>;
