//! In-memory capture backend
//!
//! Reports fixed capabilities and, each time it is started, pushes a
//! prepared list of sample chunks through the armed drain, optionally
//! followed by a stream failure. Used to exercise the engine and the
//! supervisor without an audio device.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use crate::capture::CaptureBackend;
use crate::drain::PeriodDrain;
use crate::error::{AudioError, CaptureError};
use crate::params::{CaptureParams, HardwareCaps, HwParams};

/// Backend operation, as recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Open,
    Arm,
    Start,
    Stop,
}

/// Shared record of the calls a [`ScriptedBackend`] received
pub type CallLog = Arc<Mutex<Vec<BackendCall>>>;

/// Scripted capture backend
pub struct ScriptedBackend {
    caps: HardwareCaps,
    chunks: Vec<Vec<i16>>,
    failure: Option<CaptureError>,
    failures_left: usize,
    drain: Option<PeriodDrain>,
    calls: CallLog,
}

impl ScriptedBackend {
    /// A backend with the given capabilities and no data
    pub fn new(caps: HardwareCaps) -> Self {
        Self {
            caps,
            chunks: Vec::new(),
            failure: None,
            failures_left: 0,
            drain: None,
            calls: CallLog::default(),
        }
    }

    /// Chunks delivered to the drain on every start
    pub fn with_chunks(mut self, chunks: Vec<Vec<i16>>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Report `err` after the chunks on the next `times` starts
    pub fn failing(mut self, err: CaptureError, times: usize) -> Self {
        self.failure = Some(err);
        self.failures_left = times;
        self
    }

    /// Handle on the call log, valid after the backend is moved
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl CaptureBackend for ScriptedBackend {
    fn open(&mut self, _params: &CaptureParams) -> Result<HardwareCaps, AudioError> {
        self.record(BackendCall::Open);
        Ok(self.caps.clone())
    }

    fn arm(&mut self, _hw: &HwParams, drain: PeriodDrain) -> Result<(), AudioError> {
        self.record(BackendCall::Arm);
        self.drain = Some(drain);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.record(BackendCall::Start);
        let drain = self
            .drain
            .as_mut()
            .ok_or(AudioError::InvalidState("not armed"))?;

        for chunk in &self.chunks {
            drain.push(chunk);
        }
        if self.failures_left > 0 {
            if let Some(err) = &self.failure {
                drain.error_reporter().report(err.clone());
                self.failures_left -= 1;
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.record(BackendCall::Stop);
        self.drain = None;
        Ok(())
    }
}

/// A sine tone as 16-bit samples
pub fn tone(rate: u32, frequency_hz: f64, amplitude: f64, len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| {
            let t = i as f64 / rate as f64;
            (amplitude * i16::MAX as f64 * (2.0 * PI * frequency_hz * t).sin()) as i16
        })
        .collect()
}
