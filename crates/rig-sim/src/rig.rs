//! Simulated IC-7410
//!
//! Behaves like the rig on the CI-V line: every frame addressed to it is
//! echoed back verbatim, set commands are answered with FB (or NG when the
//! values are out of range) and queries with fixed-size telemetry frames.
//! [`Faults`] turn on the misbehaviour the controller has to survive.

use std::collections::VecDeque;

use civ_protocol::bcd::{bcd_to_frequency, bcd_to_level};
use civ_protocol::command::opcode;
use civ_protocol::frame::{self, FrameDecoder, IC7410_ADDR};
use civ_protocol::telemetry::{self, Ack};
use civ_protocol::{Filter, FrontPanel, OperatingMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Misbehaviour injected into the simulated rig's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faults {
    /// Flip a bit in the last payload byte of every echo
    pub corrupt_echo: bool,
    /// Drop the last payload byte of every telemetry reply
    pub truncate_telemetry: bool,
    /// Answer nothing at all
    pub silent: bool,
}

/// Configuration for creating a simulated rig
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedRigConfig {
    /// CI-V address the rig answers to
    pub civ_address: u8,
    /// Initial frequency in Hz
    pub initial_frequency_hz: u64,
    /// Initial operating mode
    pub initial_mode: OperatingMode,
    /// Initial DSP filter
    pub initial_filter: Filter,
    /// Initial S-meter level (0..=255)
    pub initial_s_meter: u16,
    /// Send FB/NG after set commands
    pub send_ack: bool,
}

impl Default for SimulatedRigConfig {
    fn default() -> Self {
        Self {
            civ_address: IC7410_ADDR,
            initial_frequency_hz: 7_030_000,
            initial_mode: OperatingMode::Cw,
            initial_filter: Filter::Fil1,
            initial_s_meter: 0,
            send_ack: true,
        }
    }
}

/// A simulated IC-7410
#[derive(Debug)]
pub struct SimulatedRig {
    civ_address: u8,
    send_ack: bool,
    frequency_hz: u64,
    mode: OperatingMode,
    filter: Filter,
    s_meter: u16,
    cw_speed_level: Option<u16>,
    tx_power_level: Option<u16>,
    front_panel: Vec<FrontPanel>,
    faults: Faults,
    decoder: FrameDecoder,
    pending_output: VecDeque<Vec<u8>>,
    frames_seen: usize,
}

impl SimulatedRig {
    /// Create a rig with default settings
    pub fn new() -> Self {
        Self::from_config(SimulatedRigConfig::default())
    }

    /// Create a rig from configuration
    pub fn from_config(config: SimulatedRigConfig) -> Self {
        Self {
            civ_address: config.civ_address,
            send_ack: config.send_ack,
            frequency_hz: config.initial_frequency_hz,
            mode: config.initial_mode,
            filter: config.initial_filter,
            s_meter: config.initial_s_meter.min(255),
            cw_speed_level: None,
            tx_power_level: None,
            front_panel: Vec::new(),
            faults: Faults::default(),
            decoder: FrameDecoder::new(),
            pending_output: VecDeque::new(),
            frames_seen: 0,
        }
    }

    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Turn the VFO knob
    pub fn set_frequency(&mut self, hz: u64) {
        self.frequency_hz = hz;
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn s_meter(&self) -> u16 {
        self.s_meter
    }

    /// Set the signal strength the next S-meter reply reports
    pub fn set_s_meter(&mut self, level: u16) {
        self.s_meter = level.min(255);
    }

    /// Last CW speed level received (0..=255 scale)
    pub fn cw_speed_level(&self) -> Option<u16> {
        self.cw_speed_level
    }

    /// Last RF power level received (0..=255 scale)
    pub fn tx_power_level(&self) -> Option<u16> {
        self.tx_power_level
    }

    /// Front-panel settings received, oldest first
    pub fn front_panel(&self) -> &[FrontPanel] {
        &self.front_panel
    }

    pub fn faults(&self) -> Faults {
        self.faults
    }

    pub fn set_faults(&mut self, faults: Faults) {
        self.faults = faults;
    }

    /// Number of frames addressed to this rig so far
    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    /// Feed bytes received from the controller
    ///
    /// Returns true if the rig's state changed.
    pub fn process_bytes(&mut self, data: &[u8]) -> bool {
        self.decoder.push_bytes(data);
        let mut changed = false;
        while let Some(frame) = self.decoder.next_frame() {
            changed |= self.process_frame(&frame);
        }
        changed
    }

    fn process_frame(&mut self, frame: &[u8]) -> bool {
        let (Some(header), Some(payload)) = (frame::preamble_of(frame), frame::payload(frame))
        else {
            return false;
        };
        if header.to != self.civ_address {
            trace!("Ignoring frame for 0x{:02X}", header.to);
            return false;
        }
        self.frames_seen += 1;

        if self.faults.silent {
            debug!("Simulated rig staying silent on {:02X?}", frame);
            return false;
        }

        self.queue_echo(frame);

        let reply = header.reversed();
        let before = (self.frequency_hz, self.mode, self.filter);
        match payload {
            [opcode::READ_FREQUENCY] => {
                let out = telemetry::frequency_reply(reply, self.frequency_hz);
                self.queue_telemetry(out);
            }
            [opcode::READ_MODE] => {
                let out = telemetry::mode_reply(reply, self.mode, self.filter);
                self.queue_telemetry(out);
            }
            [opcode::METER, opcode::SUB_S_METER] => {
                let out = telemetry::s_meter_reply(reply, self.s_meter);
                self.queue_telemetry(out);
            }
            _ => {
                let ack = self.apply_set(payload);
                if self.send_ack {
                    self.pending_output.push_back(telemetry::ack_frame(reply, ack));
                }
            }
        }
        before != (self.frequency_hz, self.mode, self.filter)
    }

    fn apply_set(&mut self, payload: &[u8]) -> Ack {
        use opcode::*;
        match *payload {
            [SET_FREQUENCY, ref digits @ ..] if digits.len() == 4 => match bcd_to_frequency(digits) {
                Ok(hz) => {
                    debug!("Simulated rig tuned to {} Hz", hz);
                    self.frequency_hz = hz;
                    Ack::Ok
                }
                Err(_) => Ack::Ng,
            },
            [SET_MODE, mode, filter] => {
                match (OperatingMode::from_code(mode), Filter::from_code(filter)) {
                    (Some(mode), Some(filter)) => {
                        self.mode = mode;
                        self.filter = filter;
                        Ack::Ok
                    }
                    _ => Ack::Ng,
                }
            }
            [LEVEL, SUB_KEY_SPEED, high, low] => match bcd_to_level([high, low]) {
                Ok(level) if level <= 255 => {
                    self.cw_speed_level = Some(level);
                    Ack::Ok
                }
                _ => Ack::Ng,
            },
            [LEVEL, SUB_RF_POWER, high, low] => match bcd_to_level([high, low]) {
                Ok(level) if level <= 255 => {
                    self.tx_power_level = Some(level);
                    Ack::Ok
                }
                _ => Ack::Ng,
            },
            _ => match parse_front_panel(payload) {
                Some(setting) => {
                    self.front_panel.push(setting);
                    Ack::Ok
                }
                None => {
                    debug!("Simulated rig rejecting {:02X?}", payload);
                    Ack::Ng
                }
            },
        }
    }

    fn queue_echo(&mut self, frame: &[u8]) {
        let mut echo = frame.to_vec();
        if self.faults.corrupt_echo && echo.len() > frame::FRAME_OVERHEAD {
            let last = echo.len() - 2;
            echo[last] ^= 0x01;
        }
        self.pending_output.push_back(echo);
    }

    fn queue_telemetry(&mut self, mut reply: Vec<u8>) {
        if self.faults.truncate_telemetry && reply.len() > frame::FRAME_OVERHEAD + 1 {
            let last = reply.len() - 2;
            reply.remove(last);
        }
        self.pending_output.push_back(reply);
    }

    /// Take the next pending output frame
    pub fn take_output(&mut self) -> Option<Vec<u8>> {
        self.pending_output.pop_front()
    }

    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_front_panel(payload: &[u8]) -> Option<FrontPanel> {
    use opcode::*;
    let setting = match *payload {
        [FUNCTION, SUB_IF_FILTER, n] if n <= 2 => FrontPanel::IfFilter(n),
        [FUNCTION, SUB_FILTER_SHAPE, n] if n <= 1 => FrontPanel::SoftFilterShape(n == 1),
        [FUNCTION, SUB_PREAMP, n] if n <= 2 => FrontPanel::Preamp(n),
        [FUNCTION, SUB_AGC, n] if (1..=3).contains(&n) => FrontPanel::Agc(n),
        [FUNCTION, SUB_BREAK_IN, n] if n <= 2 => FrontPanel::BreakIn(n),
        [ATTENUATOR, 0x00] => FrontPanel::Attenuator(false),
        [ATTENUATOR, 0x20] => FrontPanel::Attenuator(true),
        [ANTENNA, n] if n <= 1 => FrontPanel::Antenna(n),
        _ => return None,
    };
    Some(setting)
}
