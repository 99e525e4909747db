//! Echo-verified request/response engine
//!
//! Every operation runs one exchange against the rig:
//!
//! ```text
//! Idle -> Sent -> AwaitingEcho -> Verified | Mismatched              (set)
//!                                 Verified -> AwaitingTelemetry
//!                                          -> Decoded | TelemetryMismatch  (query)
//! ```
//!
//! The IC-7410 repeats each frame it receives; the engine compares that
//! echo with what it sent before trusting the exchange. Set operations then
//! update [`RigState`] from the request values, query operations read one
//! more frame and decode it. Nothing carries over between calls except the
//! state itself: input left over from an earlier exchange is dropped before
//! writing, late replies are skipped while waiting for the echo, and a
//! rejected exchange still reads the frame the rig sends after its echo.

use std::time::Duration;

use civ_protocol::frame::{self, Preamble};
use civ_protocol::telemetry::{self, Ack};
use civ_protocol::{Filter, FrontPanel, OperatingMode, RigCommand};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_serial::SerialStream;
use tracing::{debug, info, trace, warn};

use crate::error::RigError;
use crate::state::RigState;
use crate::transport::{SerialTransport, DEFAULT_TIMEOUT};

/// Late reply frames skipped while waiting for one echo
const MAX_STALE_REPLIES: usize = 4;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Header used for outgoing frames
    pub preamble: Preamble,
    /// Bound on waiting for any single frame
    pub timeout: Duration,
    /// Consume the FB/NG frame the rig sends after a set command
    pub expect_ack: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preamble: Preamble::COMMAND,
            timeout: DEFAULT_TIMEOUT,
            expect_ack: true,
        }
    }
}

/// Progress of a single exchange, traced for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Sent,
    AwaitingEcho,
    Verified,
    Mismatched,
    AwaitingTelemetry,
    Decoded,
    TelemetryMismatch,
}

/// Result of one status poll
#[derive(Debug, Default)]
pub struct StatusPoll {
    /// Decoded frequency, if the query succeeded
    pub frequency_hz: Option<u64>,
    /// Decoded S-meter level, if the query succeeded
    pub s_meter: Option<u16>,
    /// Recoverable failures encountered along the way
    pub errors: Vec<RigError>,
}

/// IC-7410 protocol engine
pub struct RigProtocolEngine<T> {
    transport: SerialTransport<T>,
    config: EngineConfig,
    state_tx: watch::Sender<RigState>,
}

impl RigProtocolEngine<SerialStream> {
    /// Open a serial port and build an engine on it
    pub fn connect(port_name: &str, baud_rate: u32, config: EngineConfig) -> Result<Self, RigError> {
        let transport = SerialTransport::open(port_name, baud_rate)?;
        Ok(Self::new(transport, config))
    }
}

impl<T> RigProtocolEngine<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create an engine on an existing transport
    pub fn new(transport: SerialTransport<T>, config: EngineConfig) -> Self {
        let transport = transport.with_timeout(config.timeout);
        let (state_tx, _) = watch::channel(RigState::default());
        Self {
            transport,
            config,
            state_tx,
        }
    }

    /// Snapshot of the current rig state
    pub fn state(&self) -> RigState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to rig state changes
    ///
    /// Receivers can be moved to any thread; each `borrow()` sees a
    /// consistent snapshot.
    pub fn subscribe(&self) -> watch::Receiver<RigState> {
        self.state_tx.subscribe()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn step(&self, cmd: &RigCommand, stage: Exchange) {
        trace!("{}: {:?}", cmd.name(), stage);
    }

    /// Send a command and verify the rig's echo
    async fn exchange(&mut self, cmd: &RigCommand) -> Result<(), RigError> {
        let sent = frame::encode_with(self.config.preamble, &cmd.payload())?;

        let stale = self.transport.discard_input().await;
        if stale > 0 {
            debug!("{}: dropped {} stale bytes", cmd.name(), stale);
        }

        self.transport.write_frame(&sent).await?;
        self.step(cmd, Exchange::Sent);

        self.step(cmd, Exchange::AwaitingEcho);
        let echo = self.read_echo(cmd).await?;
        debug!(
            "{}: sent {:02X?}, echo {:02X?}",
            cmd.name(),
            sent,
            echo
        );

        if !frame::frames_equal(&sent, &echo) {
            self.step(cmd, Exchange::Mismatched);
            warn!("{}: echo does not match command", cmd.name());
            self.discard_reply(cmd).await;
            return Err(RigError::EchoMismatch {
                sent,
                received: echo,
            });
        }

        self.step(cmd, Exchange::Verified);
        Ok(())
    }

    /// Read frames until one is not a reply from the rig
    ///
    /// FB/NG or telemetry frames that arrive here belong to an exchange that
    /// already gave up on them.
    async fn read_echo(&mut self, cmd: &RigCommand) -> Result<Vec<u8>, RigError> {
        let reply = self.config.preamble.reversed();
        let mut skipped = 0;
        loop {
            let frame = self.transport.read_frame().await?;
            if skipped < MAX_STALE_REPLIES && frame::preamble_of(&frame) == Some(reply) {
                skipped += 1;
                debug!("{}: skipping late reply {:02X?}", cmd.name(), frame);
                continue;
            }
            return Ok(frame);
        }
    }

    /// Consume the FB/NG or telemetry frame that follows a rejected echo
    async fn discard_reply(&mut self, cmd: &RigCommand) {
        if !cmd.is_query() && !self.config.expect_ack {
            return;
        }
        match self.transport.read_frame().await {
            Ok(reply) => trace!("{}: discarded {:02X?}", cmd.name(), reply),
            Err(e) => debug!("{}: no reply to discard: {}", cmd.name(), e),
        }
    }

    /// Run a set command and, once echoed, record it in the state
    async fn set(
        &mut self,
        cmd: RigCommand,
        update: impl FnOnce(&mut RigState),
    ) -> Result<(), RigError> {
        self.exchange(&cmd).await?;
        self.state_tx.send_modify(update);

        if self.config.expect_ack {
            self.consume_ack(&cmd).await?;
        }
        Ok(())
    }

    /// Read the FB/NG frame that follows a set command
    ///
    /// A missing or negative acknowledgement is only logged: the echo has
    /// already confirmed delivery. Transport failures still propagate.
    async fn consume_ack(&mut self, cmd: &RigCommand) -> Result<(), RigError> {
        let expected = self.config.preamble.reversed();
        match self.transport.read_frame().await {
            Ok(reply) => match (frame::preamble_of(&reply), telemetry::decode_ack(&reply)) {
                (Some(p), Some(Ack::Ok)) if p == expected => {
                    trace!("{}: FB", cmd.name());
                }
                (_, Some(Ack::Ng)) => {
                    warn!("{}: rig answered NG", cmd.name());
                }
                _ => {
                    warn!("{}: not an FB message: {:02X?}", cmd.name(), reply);
                }
            },
            Err(e) if e.is_recoverable() => {
                warn!("{}: no acknowledgement: {}", cmd.name(), e);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Run a query command and return the telemetry frame
    async fn query(&mut self, cmd: RigCommand) -> Result<Vec<u8>, RigError> {
        self.exchange(&cmd).await?;
        self.step(&cmd, Exchange::AwaitingTelemetry);
        let reply = self.transport.read_frame().await?;
        debug!("{}: reply {:02X?}", cmd.name(), reply);
        Ok(reply)
    }

    fn decoded<V>(
        &self,
        cmd: &RigCommand,
        result: Result<V, civ_protocol::ParseError>,
    ) -> Result<V, RigError> {
        match result {
            Ok(value) => {
                self.step(cmd, Exchange::Decoded);
                Ok(value)
            }
            Err(e) => {
                self.step(cmd, Exchange::TelemetryMismatch);
                let err = RigError::telemetry(cmd.name(), e);
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Tune the VFO
    pub async fn set_frequency(&mut self, hz: u64) -> Result<(), RigError> {
        info!("Frequency set to {:.3} kHz", hz as f64 / 1000.0);
        self.set(RigCommand::SetFrequency { hz }, |s| s.frequency_hz = hz)
            .await
    }

    /// Select operating mode and DSP filter together
    pub async fn set_mode(&mut self, mode: OperatingMode, filter: Filter) -> Result<(), RigError> {
        debug!("Mode set to {:?} / {:?}", mode, filter);
        self.set(RigCommand::SetMode { mode, filter }, |s| {
            s.mode = mode;
            s.filter = filter;
        })
        .await
    }

    /// Change the operating mode, keeping the current filter
    pub async fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), RigError> {
        let filter = self.state_tx.borrow().filter;
        self.set_mode(mode, filter).await
    }

    /// Change the DSP filter, keeping the current mode
    pub async fn set_filter(&mut self, filter: Filter) -> Result<(), RigError> {
        let mode = self.state_tx.borrow().mode;
        self.set_mode(mode, filter).await
    }

    /// Set the CW keying speed, clamped to 6..=48 wpm
    pub async fn set_cw_speed(&mut self, wpm: u32) -> Result<(), RigError> {
        let (min, max) = civ_protocol::bcd::CW_SPEED_RANGE;
        let wpm = wpm.clamp(min, max);
        debug!("CW speed set to {} wpm", wpm);
        self.set(RigCommand::SetCwSpeed { wpm }, |s| s.cw_speed_wpm = Some(wpm))
            .await
    }

    /// Set the RF power, clamped to 2..=100 %
    pub async fn set_tx_power(&mut self, percent: u32) -> Result<(), RigError> {
        let (min, max) = civ_protocol::bcd::TX_POWER_RANGE;
        let percent = percent.clamp(min, max);
        debug!("TX power set to {}%", percent);
        self.set(RigCommand::SetTxPower { percent }, |s| {
            s.tx_power_percent = Some(percent)
        })
        .await
    }

    /// Change a front-panel function (filters, preamp, AGC, antenna, break-in)
    pub async fn apply(&mut self, setting: FrontPanel) -> Result<(), RigError> {
        debug!("Front panel: {:?}", setting);
        self.set(RigCommand::SetFrontPanel(setting), |s| {
            s.apply_front_panel(setting)
        })
        .await
    }

    /// Read the VFO frequency
    pub async fn poll_frequency(&mut self) -> Result<u64, RigError> {
        let cmd = RigCommand::ReadFrequency;
        let reply = self.query(cmd).await?;
        let hz = self.decoded(&cmd, telemetry::decode_frequency(&reply))?;
        self.state_tx.send_if_modified(|s| {
            let changed = s.frequency_hz != hz;
            s.frequency_hz = hz;
            changed
        });
        Ok(hz)
    }

    /// Read the S-meter
    pub async fn poll_s_meter(&mut self) -> Result<u16, RigError> {
        let cmd = RigCommand::ReadSMeter;
        let reply = self.query(cmd).await?;
        let level = self.decoded(&cmd, telemetry::decode_s_meter(&reply))?;
        self.state_tx.send_if_modified(|s| {
            let changed = s.s_meter != level;
            s.s_meter = level;
            changed
        });
        Ok(level)
    }

    /// Read the operating mode and filter
    pub async fn poll_mode(&mut self) -> Result<(OperatingMode, Filter), RigError> {
        let cmd = RigCommand::ReadMode;
        let reply = self.query(cmd).await?;
        let (mode, filter) = self.decoded(&cmd, telemetry::decode_mode(&reply))?;
        self.state_tx.send_if_modified(|s| {
            let changed = s.mode != mode || s.filter != filter;
            s.mode = mode;
            s.filter = filter;
            changed
        });
        Ok((mode, filter))
    }

    /// Read frequency and S-meter
    ///
    /// Recoverable failures of either query are collected in the result;
    /// transport failures abort the poll.
    pub async fn poll_status(&mut self) -> Result<StatusPoll, RigError> {
        let mut poll = StatusPoll::default();

        match self.poll_frequency().await {
            Ok(hz) => poll.frequency_hz = Some(hz),
            Err(e) if e.is_recoverable() => poll.errors.push(e),
            Err(e) => return Err(e),
        }

        match self.poll_s_meter().await {
            Ok(level) => poll.s_meter = Some(level),
            Err(e) if e.is_recoverable() => poll.errors.push(e),
            Err(e) => return Err(e),
        }

        trace!(
            "Status: freq={:?} s_meter={:?} errors={}",
            poll.frequency_hz,
            poll.s_meter,
            poll.errors.len()
        );
        Ok(poll)
    }

    /// Give back the transport
    pub fn into_transport(self) -> SerialTransport<T> {
        self.transport
    }
}
