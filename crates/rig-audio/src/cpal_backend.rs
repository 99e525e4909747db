//! cpal capture backend
//!
//! A cpal `Stream` must stay on the thread that built it, so each armed
//! capture gets a dedicated thread that builds the input stream around the
//! drain, then waits for play/stop requests. Dropping the stream on that
//! thread ends capture.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};
use tracing::{debug, info, warn};

use crate::capture::CaptureBackend;
use crate::drain::PeriodDrain;
use crate::error::{AudioError, CaptureError};
use crate::params::{CaptureParams, HardwareCaps, HwParams};

enum Control {
    Play,
    Stop,
}

struct CaptureThread {
    control: std_mpsc::Sender<Control>,
    replies: std_mpsc::Receiver<Result<(), AudioError>>,
    handle: JoinHandle<()>,
}

/// Capture from a cpal input device
#[derive(Default)]
pub struct CpalBackend {
    device: Option<cpal::Device>,
    format: Option<SampleFormat>,
    worker: Option<CaptureThread>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Names of the input devices on the default host
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            warn!("Cannot enumerate input devices: {}", e);
            Vec::new()
        }
    }
}

fn find_device(name: &str) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    let device = if name == "default" {
        host.default_input_device()
    } else {
        host.input_devices()
            .map_err(|e| AudioError::DeviceOpen {
                device: name.to_string(),
                reason: e.to_string(),
            })?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
    };
    device.ok_or_else(|| AudioError::DeviceOpen {
        device: name.to_string(),
        reason: "no such input device".to_string(),
    })
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl CaptureBackend for CpalBackend {
    fn open(&mut self, params: &CaptureParams) -> Result<HardwareCaps, AudioError> {
        let device = find_device(&params.device_name)?;
        let configs: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| AudioError::DeviceOpen {
                device: params.device_name.clone(),
                reason: e.to_string(),
            })?
            .collect();

        // 16-bit is what the analysis consumes; float devices are converted
        let format = [SampleFormat::I16, SampleFormat::F32]
            .into_iter()
            .find(|f| configs.iter().any(|c| c.sample_format() == *f))
            .ok_or_else(|| {
                AudioError::UnsupportedConfiguration(
                    "sample format not available: device offers neither S16 nor F32".to_string(),
                )
            })?;

        let mut channels = Vec::new();
        let mut rate_range = (u32::MAX, 0);
        let mut period_range = (u32::MAX, 0);
        for config in configs.iter().filter(|c| c.sample_format() == format) {
            channels.push(config.channels());
            rate_range.0 = rate_range.0.min(config.min_sample_rate().0);
            rate_range.1 = rate_range.1.max(config.max_sample_rate().0);
            let (min, max) = match *config.buffer_size() {
                SupportedBufferSize::Range { min, max } => (min, max),
                SupportedBufferSize::Unknown => (1, u32::MAX),
            };
            period_range.0 = period_range.0.min(min);
            period_range.1 = period_range.1.max(max);
        }
        channels.sort_unstable();
        channels.dedup();

        info!(
            "Opened capture device {} ({:?})",
            device.name().unwrap_or_else(|_| params.device_name.clone()),
            format
        );

        self.device = Some(device);
        self.format = Some(format);
        Ok(HardwareCaps {
            channels,
            rate_range,
            period_range,
        })
    }

    fn arm(&mut self, hw: &HwParams, drain: PeriodDrain) -> Result<(), AudioError> {
        let (Some(device), Some(format)) = (self.device.clone(), self.format) else {
            return Err(AudioError::InvalidState("not open"));
        };
        if self.worker.is_some() {
            return Err(AudioError::InvalidState("already armed"));
        }

        let config = StreamConfig {
            channels: hw.channels,
            sample_rate: SampleRate(hw.rate),
            buffer_size: BufferSize::Fixed(hw.period_frames as u32),
        };
        let scratch_len = hw.period_samples();

        let (control_tx, control_rx) = std_mpsc::channel();
        let (reply_tx, reply_rx) = std_mpsc::channel();

        let handle = thread::Builder::new()
            .name("rig-audio-capture".to_string())
            .spawn(move || {
                run_capture_thread(device, config, format, scratch_len, drain, control_rx, reply_tx)
            })
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        match reply_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(CaptureThread {
                    control: control_tx,
                    replies: reply_rx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(AudioError::Stream("capture thread exited".to_string())),
        }
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let worker = self
            .worker
            .as_ref()
            .ok_or(AudioError::InvalidState("not armed"))?;
        worker
            .control
            .send(Control::Play)
            .map_err(|_| AudioError::Stream("capture thread exited".to_string()))?;
        worker
            .replies
            .recv()
            .map_err(|_| AudioError::Stream("capture thread exited".to_string()))?
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.control.send(Control::Stop);
            if worker.handle.join().is_err() {
                return Err(AudioError::Stream("capture thread panicked".to_string()));
            }
            debug!("Capture thread joined");
        }
        Ok(())
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_capture_thread(
    device: cpal::Device,
    config: StreamConfig,
    format: SampleFormat,
    scratch_len: usize,
    mut drain: PeriodDrain,
    control: std_mpsc::Receiver<Control>,
    replies: std_mpsc::Sender<Result<(), AudioError>>,
) {
    let errors = drain.error_reporter();
    let on_error = move |err: cpal::StreamError| {
        errors.report(CaptureError::Stream(err.to_string()));
    };

    let built = match format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                drain.push(data);
            },
            on_error,
            None,
        ),
        _ => {
            let mut scratch: Vec<i16> = Vec::with_capacity(scratch_len);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(data.iter().map(|&s| f32_to_i16(s)));
                    drain.push(&scratch);
                },
                on_error,
                None,
            )
        }
    };

    let stream = match built {
        Ok(stream) => {
            let _ = replies.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = replies.send(Err(AudioError::Stream(format!(
                "failed to build input stream: {e}"
            ))));
            return;
        }
    };

    while let Ok(cmd) = control.recv() {
        match cmd {
            Control::Play => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::Stream(format!("failed to start stream: {e}")));
                let _ = replies.send(result);
            }
            Control::Stop => {
                if let Err(e) = stream.pause() {
                    debug!("pause before drop failed: {}", e);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_conversion_saturates() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn test_start_before_arm_is_rejected() {
        let mut backend = CpalBackend::new();
        assert!(matches!(
            backend.start(),
            Err(AudioError::InvalidState("not armed"))
        ));
        assert!(backend.stop().is_ok());
    }
}
