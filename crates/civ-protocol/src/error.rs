//! Error types for CI-V framing and telemetry decoding

use thiserror::Error;

/// Errors raised while building or delimiting CI-V frames
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Encoded frame would exceed the protocol's frame limit
    #[error("payload too large: frame would be {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// No terminator found within the bounded scan
    #[error("malformed frame: no terminator within {scanned} bytes")]
    MalformedFrame { scanned: usize },

    /// Payload contains the reserved terminator byte
    #[error("payload byte {offset} is the reserved terminator 0xFD")]
    ReservedTerminator { offset: usize },
}

/// Errors that can occur while parsing rig replies
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Query reply had the wrong size
    #[error("telemetry length mismatch: expected {expected} bytes, got {actual}")]
    TelemetryLengthMismatch { expected: usize, actual: usize },

    /// Invalid BCD encoding
    #[error("invalid BCD digit: 0x{0:02X}")]
    InvalidBcd(u8),

    /// Invalid frame structure
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
