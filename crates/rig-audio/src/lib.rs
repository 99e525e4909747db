//! Receiver audio capture and spectral display data
//!
//! - **Capture**: parameters negotiated against the device, a period drain
//!   on the audio callback, and windows delivered over a bounded channel
//! - **Analysis**: windowed FFT magnitudes per bin
//! - **Display**: colormap and waterfall rows for an external renderer
//! - **Supervision**: a task that restarts capture on stream failure and
//!   publishes the latest [`SpectrumFrame`] on a `watch` channel
//!
//! # Example
//!
//! ```rust
//! use rig_audio::{colormap, SpectralProcessor, WindowFunction};
//!
//! let mut processor = SpectralProcessor::new(1024, WindowFunction::Hann);
//! let magnitudes = processor.transform(&[0i16; 1024]);
//! assert_eq!(magnitudes.len(), 513);
//!
//! let hot = colormap(1.0);
//! assert_eq!((hot.r, hot.g, hot.b), (255, 0, 0));
//! ```

pub mod capture;
pub mod colormap;
pub mod cpal_backend;
pub mod drain;
pub mod error;
pub mod params;
pub mod scripted;
pub mod spectrum;
pub mod supervisor;
pub mod waterfall;

pub use capture::{CaptureBackend, CaptureEngine, CaptureState};
pub use colormap::{colormap, colormap_b, colormap_g, colormap_r, Rgb};
pub use cpal_backend::{list_input_devices, CpalBackend};
pub use drain::{CaptureEvent, CaptureStream, PeriodDrain, SampleWindow};
pub use error::{AudioError, CaptureError};
pub use params::{negotiate, CaptureParams, HardwareCaps, HwParams, SwParams};
pub use spectrum::{bin_frequency, SpectralProcessor, WindowFunction};
pub use supervisor::{CaptureSupervisor, SpectrumFrame, SupervisorCommand, SupervisorConfig};
pub use waterfall::WaterfallScale;
