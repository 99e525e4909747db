//! Error types for rig control

use civ_protocol::{FrameError, ParseError};
use thiserror::Error;

/// Errors that can occur while talking to the rig
#[derive(Debug, Error)]
pub enum RigError {
    /// Failed to open the serial device
    #[error("failed to open {port}: {reason}")]
    DeviceOpen { port: String, reason: String },

    /// Single-byte read failed or the line closed
    #[error("read error: {0}")]
    Read(#[source] std::io::Error),

    /// Writing a frame failed
    #[error("write error: {0}")]
    Write(#[source] std::io::Error),

    /// No complete frame within the exchange timeout
    #[error("timeout after {0}ms waiting for the rig")]
    Timeout(u64),

    /// Framing error (oversized payload, missing terminator)
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The rig did not echo the command verbatim
    #[error("echo mismatch: sent {sent:02X?}, received {received:02X?}")]
    EchoMismatch { sent: Vec<u8>, received: Vec<u8> },

    /// A query reply had the wrong size
    #[error("{query} reply length mismatch: expected {expected} bytes, got {actual}")]
    TelemetryLengthMismatch {
        query: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A query reply had the right size but undecodable content
    #[error("{query} reply invalid: {source}")]
    Telemetry {
        query: &'static str,
        #[source]
        source: ParseError,
    },
}

impl RigError {
    /// Map a telemetry decode failure for `query` into a rig error
    pub fn telemetry(query: &'static str, err: ParseError) -> Self {
        match err {
            ParseError::TelemetryLengthMismatch { expected, actual } => {
                Self::TelemetryLengthMismatch {
                    query,
                    expected,
                    actual,
                }
            }
            other => Self::Telemetry {
                query,
                source: other,
            },
        }
    }

    /// Returns true if the exchange can simply be retried
    ///
    /// Per-exchange failures leave the line usable. Transport failures mean
    /// the device is gone or wedged.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::EchoMismatch { .. }
                | Self::TelemetryLengthMismatch { .. }
                | Self::Telemetry { .. }
                | Self::Frame(FrameError::MalformedFrame { .. })
        )
    }
}
