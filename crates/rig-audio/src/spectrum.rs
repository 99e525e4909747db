//! Spectral analysis of sample windows
//!
//! A window function is applied to the samples, then a forward FFT of the
//! full window length. Input is real, so only the `n/2 + 1` non-redundant
//! bins are returned, scaled so a full-scale sine centred on a bin reads 1.0.

use std::fmt;
use std::sync::Arc;

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

/// Analysis window applied before the transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Rectangular,
}

impl WindowFunction {
    /// Coefficients for a window of `n` samples
    pub fn coefficients(&self, n: usize) -> Vec<f64> {
        if n < 2 {
            return vec![1.0; n];
        }
        let m = (n - 1) as f64;
        (0..n)
            .map(|i| {
                let x = 2.0 * std::f64::consts::PI * i as f64 / m;
                match self {
                    Self::Hann => 0.5 - 0.5 * x.cos(),
                    Self::Hamming => 0.54 - 0.46 * x.cos(),
                    Self::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                    Self::Rectangular => 1.0,
                }
            })
            .collect()
    }
}

/// Windowed FFT magnitude processor
pub struct SpectralProcessor {
    size: usize,
    window_fn: WindowFunction,
    window: Vec<f64>,
    scale: f64,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for SpectralProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralProcessor")
            .field("size", &self.size)
            .field("window", &self.window_fn)
            .finish()
    }
}

impl SpectralProcessor {
    /// Create a processor for windows of `size` samples
    pub fn new(size: usize, window_fn: WindowFunction) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window = window_fn.coefficients(size);
        let gain: f64 = window.iter().sum();
        let scale = if gain > 0.0 { 2.0 / gain } else { 0.0 };

        Self {
            size,
            window_fn,
            window,
            scale,
            fft,
            buffer: vec![Complex64::new(0.0, 0.0); size],
            scratch,
        }
    }

    /// Transform length
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of magnitude bins per transform
    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }

    pub fn window_function(&self) -> WindowFunction {
        self.window_fn
    }

    /// Magnitude spectrum of one window of 16-bit samples
    ///
    /// Samples are scaled to [-1, 1). Shorter input is zero-padded, longer
    /// input is truncated to the transform size. The result depends only
    /// on `samples`.
    pub fn transform(&mut self, samples: &[i16]) -> Vec<f64> {
        let n = samples.len().min(self.size);
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let x = if i < n {
                samples[i] as f64 / 32768.0 * self.window[i]
            } else {
                0.0
            };
            *slot = Complex64::new(x, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        self.buffer[..self.bins()]
            .iter()
            .map(|c| c.norm() * self.scale)
            .collect()
    }
}

/// Centre frequency of `bin` for a transform of `size` samples at `rate` Hz
pub fn bin_frequency(bin: usize, rate: u32, size: usize) -> f64 {
    bin as f64 * rate as f64 / size as f64
}

/// Magnitude in decibels, floored to avoid `-inf`
pub fn to_db(magnitude: f64) -> f64 {
    20.0 * magnitude.max(1e-12).log10()
}

/// Index and value of the strongest bin, skipping DC
pub fn peak_bin(magnitudes: &[f64]) -> Option<(usize, f64)> {
    magnitudes
        .iter()
        .copied()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::tone;

    #[test]
    fn test_bin_count() {
        let mut p = SpectralProcessor::new(4096, WindowFunction::Hann);
        assert_eq!(p.transform(&[0; 4096]).len(), 2049);
    }

    #[test]
    fn test_tone_lands_in_its_bin() {
        let rate = 48_000;
        let size = 4096;
        // Exactly bin 256
        let freq = bin_frequency(256, rate, size);
        let samples = tone(rate, freq, 0.5, size);

        let mut p = SpectralProcessor::new(size, WindowFunction::Hann);
        let (bin, magnitude) = peak_bin(&p.transform(&samples)).unwrap();
        assert_eq!(bin, 256);
        assert_eq!(freq, 3000.0);
        assert!((magnitude - 0.5).abs() < 0.01, "magnitude {magnitude}");
    }

    #[test]
    fn test_transform_is_repeatable() {
        let samples = tone(8000, 1000.0, 0.3, 1024);
        let mut p = SpectralProcessor::new(1024, WindowFunction::Blackman);
        let first = p.transform(&samples);
        let _ = p.transform(&tone(8000, 2500.0, 0.9, 1024));
        assert_eq!(p.transform(&samples), first);
    }

    #[test]
    fn test_window_shapes() {
        let hann = WindowFunction::Hann.coefficients(5);
        assert!(hann[0].abs() < 1e-12);
        assert!((hann[2] - 1.0).abs() < 1e-12);
        assert!(WindowFunction::Rectangular
            .coefficients(8)
            .iter()
            .all(|&w| w == 1.0));
    }

    #[test]
    fn test_db_floor() {
        assert_eq!(to_db(1.0), 0.0);
        assert!(to_db(0.0).is_finite());
    }
}
