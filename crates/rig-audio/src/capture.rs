//! Capture engine
//!
//! [`CaptureEngine`] drives a [`CaptureBackend`] through the capture
//! lifecycle:
//!
//! ```text
//! initialize: open -> negotiate -> Prepared
//! start:      arm drain callback -> Running
//! stop:       Running -> Prepared
//! ```
//!
//! All parameter checks happen in `initialize`, so a configuration the
//! analysis cannot use is rejected before any callback exists.

use tracing::{debug, info};

use crate::drain::{self, CaptureStream, PeriodDrain};
use crate::error::AudioError;
use crate::params::{negotiate, CaptureParams, HardwareCaps, HwParams, SwParams};

/// Device side of capture
///
/// Implementations own the device and run the drain on whatever thread the
/// audio system calls back on.
pub trait CaptureBackend: Send {
    /// Open the device named in `params` and report its capabilities
    fn open(&mut self, params: &CaptureParams) -> Result<HardwareCaps, AudioError>;

    /// Bind the drain to the device's data callback
    fn arm(&mut self, hw: &HwParams, drain: PeriodDrain) -> Result<(), AudioError>;

    /// Begin streaming into the armed drain
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop streaming and release the drain
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Parameters applied, not streaming
    Prepared,
    /// Drain armed and device streaming
    Running,
}

/// Audio capture engine
pub struct CaptureEngine<B: CaptureBackend> {
    backend: B,
    params: CaptureParams,
    hw: HwParams,
    sw: SwParams,
    state: CaptureState,
}

impl<B: CaptureBackend> CaptureEngine<B> {
    /// Open the device and negotiate hardware and software parameters
    pub fn initialize(mut backend: B, params: CaptureParams) -> Result<Self, AudioError> {
        info!(
            "Initializing capture on {}: {} Hz, {} channel(s)",
            params.device_name, params.sample_rate, params.channels
        );
        let caps = backend.open(&params)?;
        debug!("Device capabilities: {:?}", caps);

        let hw = negotiate(&caps, &params)?;
        let sw = SwParams::derive(&hw, params.period_event);
        debug!(
            "start threshold {} frames, avail min {} frames",
            sw.start_threshold, sw.avail_min
        );

        Ok(Self {
            backend,
            params,
            hw,
            sw,
            state: CaptureState::Prepared,
        })
    }

    /// Arm the drain callback and start streaming
    pub fn start(&mut self) -> Result<CaptureStream, AudioError> {
        if self.state != CaptureState::Prepared {
            return Err(AudioError::InvalidState("already running"));
        }

        let (drain, stream) = drain::channel(&self.hw, &self.sw);
        self.backend.arm(&self.hw, drain)?;
        if let Err(e) = self.backend.start() {
            let _ = self.backend.stop();
            return Err(e);
        }

        self.state = CaptureState::Running;
        info!("Capture started on {}", self.params.device_name);
        Ok(stream)
    }

    /// Stop streaming; the engine can be started again
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if self.state == CaptureState::Prepared {
            return Ok(());
        }
        self.state = CaptureState::Prepared;
        self.backend.stop()?;
        info!("Capture stopped on {}", self.params.device_name);
        Ok(())
    }

    /// Stop and start again with a fresh drain
    pub fn restart(&mut self) -> Result<CaptureStream, AudioError> {
        self.stop()?;
        self.start()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn hw_params(&self) -> &HwParams {
        &self.hw
    }

    pub fn sw_params(&self) -> &SwParams {
        &self.sw
    }

    pub fn params(&self) -> &CaptureParams {
        &self.params
    }

    /// Borrow the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: CaptureBackend> Drop for CaptureEngine<B> {
    fn drop(&mut self) {
        if self.state == CaptureState::Running {
            debug!("Capture engine dropped while running, stopping");
            let _ = self.backend.stop();
        }
    }
}
