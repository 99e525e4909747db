//! Simulated rig actor task
//!
//! Owns a [`SimulatedRig`] and talks CI-V over an async stream. The task
//! uses a select! loop to:
//! - Read controller frames from the stream and answer them
//! - Handle control commands (S-meter changes, faults, shutdown)
//! - Emit state change events on a broadcast channel

use std::io;

use civ_protocol::{Filter, OperatingMode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::rig::{Faults, SimulatedRig};

/// Commands that can be sent to a simulated rig task
#[derive(Debug, Clone)]
pub enum SimulatedRigCommand {
    /// Change the signal strength reported by the S-meter
    SetSMeter(u16),
    /// Turn the VFO knob
    SetFrequency(u64),
    /// Replace the active faults
    SetFaults(Faults),
    /// Shutdown the task
    Shutdown,
}

/// State event emitted when the simulated rig changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedRigEvent {
    pub frequency_hz: u64,
    pub mode: OperatingMode,
    pub filter: Filter,
}

impl SimulatedRigEvent {
    fn of(rig: &SimulatedRig) -> Self {
        Self {
            frequency_hz: rig.frequency_hz(),
            mode: rig.mode(),
            filter: rig.filter(),
        }
    }
}

/// Run the simulated rig until the stream closes or shutdown is requested
pub async fn run_simulated_rig<S>(
    mut stream: S,
    mut rig: SimulatedRig,
    mut cmd_rx: mpsc::Receiver<SimulatedRigCommand>,
    state_tx: broadcast::Sender<SimulatedRigEvent>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];

    info!("Starting simulated IC-7410");
    let _ = state_tx.send(SimulatedRigEvent::of(&rig));

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Simulated rig stream closed");
                        break;
                    }
                    Ok(n) => {
                        if rig.process_bytes(&buf[..n]) {
                            let _ = state_tx.send(SimulatedRigEvent::of(&rig));
                        }
                        while let Some(out) = rig.take_output() {
                            stream.write_all(&out).await?;
                        }
                        stream.flush().await?;
                    }
                    Err(e) => {
                        warn!("Simulated rig stream error: {}", e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SimulatedRigCommand::SetSMeter(level)) => rig.set_s_meter(level),
                    Some(SimulatedRigCommand::SetFrequency(hz)) => {
                        rig.set_frequency(hz);
                        let _ = state_tx.send(SimulatedRigEvent::of(&rig));
                    }
                    Some(SimulatedRigCommand::SetFaults(faults)) => {
                        info!("Simulated rig faults: {:?}", faults);
                        rig.set_faults(faults);
                    }
                    Some(SimulatedRigCommand::Shutdown) | None => {
                        debug!("Simulated rig shutting down");
                        break;
                    }
                }
            }
        }
    }

    info!("Simulated IC-7410 stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use civ_protocol::{frame, telemetry, RigCommand};
    use std::time::Duration;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_task_answers_and_emits_state() {
        let (mut controller, rig_stream) = duplex(1024);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, mut state_rx) = broadcast::channel(8);

        let handle = tokio::spawn(run_simulated_rig(
            rig_stream,
            SimulatedRig::new(),
            cmd_rx,
            state_tx,
        ));

        let initial = state_rx.recv().await.unwrap();
        assert_eq!(initial.frequency_hz, 7_030_000);

        let sent = frame::encode(&RigCommand::SetFrequency { hz: 10_106_000 }.payload()).unwrap();
        controller.write_all(&sent).await.unwrap();

        let mut echo = vec![0u8; sent.len()];
        controller.read_exact(&mut echo).await.unwrap();
        assert_eq!(echo, sent);

        let mut ack = [0u8; 6];
        controller.read_exact(&mut ack).await.unwrap();
        assert_eq!(telemetry::decode_ack(&ack), Some(telemetry::Ack::Ok));

        let event = tokio::time::timeout(Duration::from_millis(100), state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.frequency_hz, 10_106_000);

        cmd_tx.send(SimulatedRigCommand::Shutdown).await.unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_task_ends_when_stream_closes() {
        let (controller, rig_stream) = duplex(64);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, _state_rx) = broadcast::channel(8);

        let handle = tokio::spawn(run_simulated_rig(
            rig_stream,
            SimulatedRig::new(),
            cmd_rx,
            state_tx,
        ));
        drop(controller);

        let result = tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .unwrap();
        assert!(result.unwrap().is_ok());
    }
}
