//! Capture supervisor task
//!
//! Owns a [`CaptureEngine`], turns every sample window into a
//! [`SpectrumFrame`] and publishes the latest one on a `watch` channel.
//! The renderer polls the receiver; `has_changed()` is the "new window
//! ready" signal.
//!
//! Callback-path failures arrive as [`CaptureError`]s. Overruns are only
//! logged. Stream failures restart capture, up to `max_restarts` times over
//! the life of the task.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureBackend, CaptureEngine};
use crate::colormap::Rgb;
use crate::drain::CaptureEvent;
use crate::error::{AudioError, CaptureError};
use crate::spectrum::{bin_frequency, peak_bin, to_db, SpectralProcessor, WindowFunction};
use crate::waterfall::WaterfallScale;

/// Supervisor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Restarts allowed before giving up
    pub max_restarts: u32,
    /// Analysis window
    pub window: WindowFunction,
    /// Waterfall colour scale
    pub scale: WaterfallScale,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            window: WindowFunction::Hann,
            scale: WaterfallScale::default(),
        }
    }
}

/// One analysed window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumFrame {
    /// Period index of the source window
    pub sequence: u64,
    /// Sample rate the window was captured at
    pub rate: u32,
    /// Transform length
    pub transform_size: usize,
    /// Magnitude per bin
    pub magnitudes: Vec<f64>,
    /// Colour per bin
    pub row: Vec<Rgb>,
}

impl SpectrumFrame {
    /// Frequency (Hz) and level (dB) of the strongest bin
    pub fn peak(&self) -> Option<(f64, f64)> {
        peak_bin(&self.magnitudes).map(|(bin, magnitude)| {
            (
                bin_frequency(bin, self.rate, self.transform_size),
                to_db(magnitude),
            )
        })
    }
}

/// Commands accepted by a running supervisor
#[derive(Debug, Clone)]
pub enum SupervisorCommand {
    /// Replace the waterfall colour scale
    SetScale(WaterfallScale),
    /// Stop capture and end the task
    Shutdown,
}

/// Handle to a spawned supervisor task
pub struct CaptureSupervisor {
    cmd_tx: mpsc::Sender<SupervisorCommand>,
    frames: watch::Receiver<SpectrumFrame>,
    handle: JoinHandle<Result<(), AudioError>>,
}

impl CaptureSupervisor {
    /// Spawn a supervisor on the current runtime
    pub fn spawn<B>(engine: CaptureEngine<B>, config: SupervisorConfig) -> Self
    where
        B: CaptureBackend + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (frame_tx, frames) = watch::channel(SpectrumFrame::default());
        let handle = tokio::spawn(run_capture_supervisor(engine, config, cmd_rx, frame_tx));
        Self {
            cmd_tx,
            frames,
            handle,
        }
    }

    /// A receiver for published frames
    pub fn frames(&self) -> watch::Receiver<SpectrumFrame> {
        self.frames.clone()
    }

    pub async fn set_scale(&self, scale: WaterfallScale) {
        let _ = self.cmd_tx.send(SupervisorCommand::SetScale(scale)).await;
    }

    /// Returns true once the task has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it
    ///
    /// Returns the error that ended the task early, if any.
    pub async fn shutdown(self) -> Result<(), AudioError> {
        let _ = self.cmd_tx.send(SupervisorCommand::Shutdown).await;
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(AudioError::Stream(format!("supervisor task failed: {e}"))),
        }
    }
}

/// Run capture until shut down or out of restarts
pub async fn run_capture_supervisor<B: CaptureBackend>(
    mut engine: CaptureEngine<B>,
    config: SupervisorConfig,
    mut cmd_rx: mpsc::Receiver<SupervisorCommand>,
    frame_tx: watch::Sender<SpectrumFrame>,
) -> Result<(), AudioError> {
    let hw = *engine.hw_params();
    let mut processor = SpectralProcessor::new(hw.transform_size, config.window);
    let mut scale = config.scale;
    let mut restarts = 0;

    let mut stream = engine.start()?;
    info!(
        "Capture supervisor running ({} bins per frame)",
        processor.bins()
    );

    loop {
        let failure = tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SupervisorCommand::SetScale(s)) => {
                        debug!("Waterfall scale {:?}", s);
                        scale = s;
                        continue;
                    }
                    Some(SupervisorCommand::Shutdown) | None => break,
                }
            }

            event = stream.next_event() => {
                match event {
                    Some(CaptureEvent::Window(window)) => {
                        let magnitudes = processor.transform(&window.samples);
                        let row = scale.row(&magnitudes);
                        frame_tx.send_replace(SpectrumFrame {
                            sequence: window.sequence,
                            rate: hw.rate,
                            transform_size: hw.transform_size,
                            magnitudes,
                            row,
                        });
                        stream.recycle(window);
                        continue;
                    }
                    Some(CaptureEvent::Error(err)) if !err.needs_restart() => {
                        warn!("Capture: {}", err);
                        continue;
                    }
                    Some(CaptureEvent::Error(err)) => err,
                    None => CaptureError::Stream("capture ended unexpectedly".to_string()),
                }
            }
        };

        if restarts >= config.max_restarts {
            error!("Capture failed: {}; giving up after {} restart(s)", failure, restarts);
            let _ = engine.stop();
            return Err(failure.into());
        }
        restarts += 1;
        warn!(
            "Capture failed: {}; restarting ({}/{})",
            failure, restarts, config.max_restarts
        );
        stream = engine.restart()?;
    }

    engine.stop()?;
    info!("Capture supervisor stopped");
    Ok(())
}
