//! Periodic status polling task
//!
//! The poller shares the engine with the rest of the program behind an
//! async mutex, so every poll is one complete exchange that never
//! interleaves with a set command on the wire.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::RigProtocolEngine;
use crate::error::RigError;

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Commands accepted by a running poller
#[derive(Debug, Clone)]
pub enum PollerCommand {
    /// Pause or resume polling
    SetEnabled(bool),
    /// Stop the task
    Shutdown,
}

/// Handle to a spawned poller task
pub struct StatusPoller {
    cmd_tx: mpsc::Sender<PollerCommand>,
    handle: JoinHandle<Result<(), RigError>>,
}

impl StatusPoller {
    /// Spawn a poller on the current runtime
    pub fn spawn<T>(engine: Arc<Mutex<RigProtocolEngine<T>>>, period: Duration) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_status_poller(engine, period, cmd_rx));
        Self { cmd_tx, handle }
    }

    /// Pause or resume polling
    pub async fn set_enabled(&self, enabled: bool) {
        let _ = self.cmd_tx.send(PollerCommand::SetEnabled(enabled)).await;
    }

    /// Stop the task and wait for it
    ///
    /// Returns the transport error that ended the task early, if any.
    pub async fn shutdown(self) -> Result<(), RigError> {
        let _ = self.cmd_tx.send(PollerCommand::Shutdown).await;
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Status poller task failed: {}", e);
                Ok(())
            }
        }
    }
}

/// Poll frequency and S-meter until shut down
///
/// Recoverable per-exchange failures are logged and the next tick tries
/// again. A transport failure ends the task with that error.
pub async fn run_status_poller<T>(
    engine: Arc<Mutex<RigProtocolEngine<T>>>,
    period: Duration,
    mut cmd_rx: mpsc::Receiver<PollerCommand>,
) -> Result<(), RigError>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut enabled = true;

    info!("Status poller started ({:?})", period);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PollerCommand::SetEnabled(on)) => {
                        debug!("Status polling {}", if on { "enabled" } else { "paused" });
                        enabled = on;
                    }
                    Some(PollerCommand::Shutdown) | None => break,
                }
            }

            _ = timer.tick(), if enabled => {
                let poll = engine.lock().await.poll_status().await?;
                for e in &poll.errors {
                    warn!("Status poll: {}", e);
                }
            }
        }
    }

    info!("Status poller stopped");
    Ok(())
}
