//! IC-7410 monitor
//!
//! Polls frequency and S-meter over CI-V and runs a spectrum of the
//! receive audio, logging both. Configuration comes from
//! `$XDG_CONFIG_HOME/ic7410-monitor/settings.json`.

mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rig_audio::{list_input_devices, CaptureEngine, CaptureSupervisor, CpalBackend};
use rig_control::{list_ports, RigProtocolEngine, RigState, StatusPoller};
use settings::{AudioSettings, RigSettings, Settings};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ic7410_monitor=info,civ_protocol=info,rig_control=info,rig_audio=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IC-7410 monitor");

    let settings = Settings::load();
    if settings == Settings::default() {
        if let Err(e) = settings.save() {
            warn!("Could not write default settings: {:#}", e);
        }
    }

    let rig = start_rig(&settings.rig).await?;
    let audio = start_audio(&settings.audio)?;

    let mut rig_state = rig.as_ref().map(|(state, _)| state.clone());
    let mut frames = audio.as_ref().map(|s| s.frames());
    let mut report = tokio::time::interval(Duration::from_millis(
        settings.audio.report_interval_ms.max(100),
    ));
    report.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }

            changed = wait_changed(&mut rig_state) => {
                if changed.is_err() {
                    warn!("Rig state channel closed");
                    rig_state = None;
                    continue;
                }
                if let Some(rx) = rig_state.as_mut() {
                    let state = rx.borrow_and_update().clone();
                    info!(
                        "Rig: {} Hz {:?}/{:?} S-meter {}",
                        state.frequency_hz, state.mode, state.filter, state.s_meter
                    );
                }
            }

            _ = report.tick() => {
                if let Some(rx) = frames.as_mut() {
                    if rx.has_changed().unwrap_or(false) {
                        let frame = rx.borrow_and_update();
                        if let Some((freq, db)) = frame.peak() {
                            info!("Audio #{}: peak {:.1} Hz at {:.1} dBFS", frame.sequence, freq, db);
                        }
                    }
                }
            }
        }
    }

    if let Some((_, poller)) = rig {
        if let Err(e) = poller.shutdown().await {
            warn!("Status poller ended with: {}", e);
        }
    }
    if let Some(supervisor) = audio {
        if let Err(e) = supervisor.shutdown().await {
            warn!("Audio capture ended with: {}", e);
        }
    }

    info!("Stopped");
    Ok(())
}

/// Resolves on the next state change, or never when there is no rig
async fn wait_changed<T>(
    rx: &mut Option<watch::Receiver<T>>,
) -> Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

/// Connect to the rig and start polling it
async fn start_rig(
    settings: &RigSettings,
) -> anyhow::Result<Option<(watch::Receiver<RigState>, StatusPoller)>> {
    if settings.port.is_empty() {
        match list_ports() {
            Ok(ports) => info!("No serial port configured; available: {:?}", ports),
            Err(e) => warn!("No serial port configured: {}", e),
        }
        return Ok(None);
    }

    let mut engine =
        RigProtocolEngine::connect(&settings.port, settings.baud_rate, settings.engine_config())
            .with_context(|| format!("Failed to open {}", settings.port))?;

    match engine.poll_mode().await {
        Ok((mode, filter)) => info!("Rig in {:?} ({:?})", mode, filter),
        Err(e) if e.is_recoverable() => warn!("Initial mode read failed: {}", e),
        Err(e) => return Err(e).context("Rig did not answer"),
    }

    let state = engine.subscribe();
    let poller = StatusPoller::spawn(Arc::new(Mutex::new(engine)), settings.poll_interval());
    Ok(Some((state, poller)))
}

/// Open the capture device and start the spectrum supervisor
fn start_audio(settings: &AudioSettings) -> anyhow::Result<Option<CaptureSupervisor>> {
    if !settings.enabled {
        return Ok(None);
    }
    info!("Input devices: {:?}", list_input_devices());

    let engine = CaptureEngine::initialize(CpalBackend::new(), settings.capture.clone())
        .with_context(|| format!("Failed to open audio device {}", settings.capture.device_name))?;
    let hw = engine.hw_params();
    info!(
        "Capturing {} Hz x{}, period {} frames, buffer {} frames",
        hw.rate, hw.channels, hw.period_frames, hw.buffer_frames
    );

    Ok(Some(CaptureSupervisor::spawn(engine, settings.supervisor)))
}
