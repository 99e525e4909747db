//! Capture parameters and their negotiation against the hardware
//!
//! Negotiation mirrors what a capture driver does with a parameter request:
//! the channel count must be available exactly, the rate is matched to the
//! nearest supported value (and rejected if that is not the requested rate,
//! unless resampling is allowed), and buffer and period sizes are taken as
//! close to the requested times as the device allows.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AudioError;

/// Samples consumed by one spectral analysis pass
pub const DEFAULT_TRANSFORM_SIZE: usize = 4096;

/// Requested capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureParams {
    /// Input device name; `"default"` picks the host's default input
    pub device_name: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Requested ring buffer length in microseconds
    pub buffer_time_us: u32,
    /// Requested period length in microseconds
    pub period_time_us: u32,
    /// Allow software resampling to reach the requested rate
    pub resample: bool,
    /// Wake once per full buffer instead of once per period
    pub period_event: bool,
    /// Samples per analysis window (power of two)
    pub transform_size: usize,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            device_name: "default".to_string(),
            sample_rate: 48_000,
            channels: 1,
            buffer_time_us: 500_000,
            period_time_us: 100_000,
            resample: false,
            period_event: false,
            transform_size: DEFAULT_TRANSFORM_SIZE,
        }
    }
}

impl CaptureParams {
    /// Check the request for values no device could satisfy
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.transform_size == 0 || !self.transform_size.is_power_of_two() {
            return Err(AudioError::InvalidTransformSize(self.transform_size));
        }
        if self.channels == 0 {
            return Err(AudioError::UnsupportedConfiguration(
                "channel count must be at least 1".to_string(),
            ));
        }
        if self.sample_rate == 0 || self.period_time_us == 0 || self.buffer_time_us == 0 {
            return Err(AudioError::UnsupportedConfiguration(
                "rate, buffer time and period time must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// What the device can do for 16-bit interleaved capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCaps {
    /// Channel counts the device accepts
    pub channels: Vec<u16>,
    /// Lowest and highest supported sample rate
    pub rate_range: (u32, u32),
    /// Smallest and largest period the device delivers, in frames
    pub period_range: (u32, u32),
}

/// Negotiated hardware parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwParams {
    /// Sample rate in Hz
    pub rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Frames per period
    pub period_frames: usize,
    /// Frames held by the staging buffer
    pub buffer_frames: usize,
    /// Samples per analysis window
    pub transform_size: usize,
}

impl HwParams {
    /// Interleaved samples in one period
    pub fn period_samples(&self) -> usize {
        self.period_frames * self.channels as usize
    }

    /// Interleaved samples in the staging buffer
    pub fn buffer_samples(&self) -> usize {
        self.buffer_frames * self.channels as usize
    }
}

/// Wake-up and start thresholds for the drain callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwParams {
    /// Frames that must be staged before the first drain
    pub start_threshold: usize,
    /// Frames that must be staged before a drain pass runs
    pub avail_min: usize,
    /// Period events enabled
    pub period_event: bool,
}

impl SwParams {
    /// Derive thresholds from the negotiated hardware parameters
    ///
    /// Start when the buffer is almost full (a whole number of periods).
    /// Drain every period, or once per buffer when period events are on.
    pub fn derive(hw: &HwParams, period_event: bool) -> Self {
        let start_threshold = (hw.buffer_frames / hw.period_frames) * hw.period_frames;
        let avail_min = if period_event {
            hw.buffer_frames
        } else {
            hw.period_frames
        };
        Self {
            start_threshold,
            avail_min,
            period_event,
        }
    }
}

fn frames_for(rate: u32, time_us: u32) -> u64 {
    (rate as u64 * time_us as u64) / 1_000_000
}

/// Negotiate capture parameters against what the device offers
pub fn negotiate(caps: &HardwareCaps, params: &CaptureParams) -> Result<HwParams, AudioError> {
    params.validate()?;

    if !caps.channels.contains(&params.channels) {
        return Err(AudioError::UnsupportedConfiguration(format!(
            "channels count ({}) not available, device offers {:?}",
            params.channels, caps.channels
        )));
    }

    let (min_rate, max_rate) = caps.rate_range;
    let (min_period, max_period) = caps.period_range;
    if min_rate > max_rate || min_period > max_period {
        return Err(AudioError::UnsupportedConfiguration(format!(
            "device reports empty ranges: rate {:?}, period {:?}",
            caps.rate_range, caps.period_range
        )));
    }

    let rate = if params.resample {
        params.sample_rate
    } else {
        let nearest = params.sample_rate.clamp(min_rate, max_rate);
        if nearest != params.sample_rate {
            return Err(AudioError::RateMismatch {
                requested: params.sample_rate,
                actual: nearest,
            });
        }
        nearest
    };

    let period_frames = frames_for(rate, params.period_time_us)
        .clamp(min_period.max(1) as u64, max_period.max(1) as u64) as usize;

    let buffer_frames =
        (frames_for(rate, params.buffer_time_us) as usize).max(2 * period_frames);

    debug!(
        "negotiated rate={} period={} frames buffer={} frames",
        rate, period_frames, buffer_frames
    );

    if period_frames < params.transform_size {
        return Err(AudioError::UnsupportedConfiguration(format!(
            "period_size = {}, but less than transform size = {}",
            period_frames, params.transform_size
        )));
    }

    let hw = HwParams {
        rate,
        channels: params.channels,
        period_frames,
        buffer_frames,
        transform_size: params.transform_size,
    };
    info!(
        "Capture: {} Hz, {} channel(s), period {} frames, buffer {} frames",
        hw.rate, hw.channels, hw.period_frames, hw.buffer_frames
    );
    Ok(hw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> HardwareCaps {
        HardwareCaps {
            channels: vec![1, 2],
            rate_range: (8_000, 48_000),
            period_range: (64, 8192),
        }
    }

    #[test]
    fn test_defaults_negotiate() {
        let hw = negotiate(&caps(), &CaptureParams::default()).unwrap();
        assert_eq!(hw.rate, 48_000);
        assert_eq!(hw.period_frames, 4800);
        assert_eq!(hw.buffer_frames, 24_000);
        assert_eq!(hw.period_samples(), 4800);
    }

    #[test]
    fn test_short_period_rejected() {
        let caps = HardwareCaps {
            period_range: (64, 2048),
            ..caps()
        };
        let err = negotiate(&caps, &CaptureParams::default()).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn test_rate_mismatch_without_resample() {
        let params = CaptureParams {
            sample_rate: 96_000,
            ..Default::default()
        };
        let err = negotiate(&caps(), &params).unwrap_err();
        assert!(matches!(
            err,
            AudioError::RateMismatch {
                requested: 96_000,
                actual: 48_000
            }
        ));

        let params = CaptureParams {
            resample: true,
            ..params
        };
        assert_eq!(negotiate(&caps(), &params).unwrap().rate, 96_000);
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let reversed_rate = HardwareCaps {
            rate_range: (48_000, 8_000),
            ..caps()
        };
        assert!(matches!(
            negotiate(&reversed_rate, &CaptureParams::default()),
            Err(AudioError::UnsupportedConfiguration(_))
        ));

        let reversed_period = HardwareCaps {
            period_range: (8192, 64),
            ..caps()
        };
        let params = CaptureParams {
            resample: true,
            ..Default::default()
        };
        assert!(matches!(
            negotiate(&reversed_period, &params),
            Err(AudioError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_channels_must_match_exactly() {
        let params = CaptureParams {
            channels: 4,
            ..Default::default()
        };
        assert!(matches!(
            negotiate(&caps(), &params),
            Err(AudioError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_transform_size_power_of_two() {
        let params = CaptureParams {
            transform_size: 3000,
            ..Default::default()
        };
        assert!(matches!(
            negotiate(&caps(), &params),
            Err(AudioError::InvalidTransformSize(3000))
        ));
    }

    #[test]
    fn test_buffer_holds_two_periods() {
        let params = CaptureParams {
            buffer_time_us: 50_000,
            ..Default::default()
        };
        let hw = negotiate(&caps(), &params).unwrap();
        assert_eq!(hw.buffer_frames, 2 * hw.period_frames);
    }

    #[test]
    fn test_sw_params() {
        let hw = HwParams {
            rate: 48_000,
            channels: 1,
            period_frames: 4800,
            buffer_frames: 22_000,
            transform_size: 4096,
        };
        let sw = SwParams::derive(&hw, false);
        assert_eq!(sw.start_threshold, 19_200);
        assert_eq!(sw.avail_min, 4800);

        let sw = SwParams::derive(&hw, true);
        assert_eq!(sw.avail_min, 22_000);
        assert!(sw.period_event);
    }
}
