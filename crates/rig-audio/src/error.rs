//! Error types for audio capture

use thiserror::Error;

/// Errors raised while setting up or controlling capture
#[derive(Debug, Error)]
pub enum AudioError {
    /// The capture device could not be found or opened
    #[error("cannot open capture device {device}: {reason}")]
    DeviceOpen { device: String, reason: String },

    /// The device cannot be configured the way the analysis needs
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The device does not run at the requested rate and resampling is off
    #[error("rate doesn't match (requested {requested} Hz, got {actual} Hz)")]
    RateMismatch { requested: u32, actual: u32 },

    /// Transform size must be a non-zero power of two
    #[error("transform size {0} is not a power of two")]
    InvalidTransformSize(usize),

    /// The backend failed to build, start or stop the stream
    #[error("stream error: {0}")]
    Stream(String),

    /// Operation not valid in the engine's current state
    #[error("capture is {0}")]
    InvalidState(&'static str),

    /// Capture failed at runtime and could not be restarted
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
}

/// Errors raised on the capture callback path
///
/// These are sent to the owner over a channel instead of aborting the
/// audio thread.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Sample windows were dropped because the consumer fell behind
    #[error("overrun: {dropped} window(s) dropped")]
    Overrun { dropped: u64 },

    /// The device reported a stream failure
    #[error("stream failure: {0}")]
    Stream(String),
}

impl CaptureError {
    /// Returns true if capture must be restarted to recover
    pub fn needs_restart(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}
