//! IC-7410 command set
//!
//! Every command the controller sends is described by [`RigCommand`], which
//! knows its payload bytes (everything between the preamble and the
//! terminator) and whether the rig answers it with a telemetry frame.

use crate::bcd::{cw_speed_level, frequency_to_bcd, level_to_bcd, tx_power_level};

/// CI-V command codes used by this controller
pub mod opcode {
    /// Read frequency
    pub const READ_FREQUENCY: u8 = 0x03;
    /// Read mode and filter
    pub const READ_MODE: u8 = 0x04;
    /// Set frequency
    pub const SET_FREQUENCY: u8 = 0x05;
    /// Set mode and filter
    pub const SET_MODE: u8 = 0x06;
    /// Attenuator
    pub const ATTENUATOR: u8 = 0x11;
    /// Antenna select
    pub const ANTENNA: u8 = 0x12;
    /// Level settings (sub-commands below)
    pub const LEVEL: u8 = 0x14;
    /// Meter readings (sub-commands below)
    pub const METER: u8 = 0x15;
    /// Function settings (sub-commands below)
    pub const FUNCTION: u8 = 0x16;
    /// OK acknowledgement from the rig
    pub const OK: u8 = 0xFB;
    /// NG acknowledgement from the rig
    pub const NG: u8 = 0xFA;

    /// `14 0A`: RF power level
    pub const SUB_RF_POWER: u8 = 0x0A;
    /// `14 0C`: CW keying speed
    pub const SUB_KEY_SPEED: u8 = 0x0C;
    /// `15 02`: S-meter level
    pub const SUB_S_METER: u8 = 0x02;
    /// `16 02`: preamp
    pub const SUB_PREAMP: u8 = 0x02;
    /// `16 12`: AGC time constant
    pub const SUB_AGC: u8 = 0x12;
    /// `16 47`: break-in
    pub const SUB_BREAK_IN: u8 = 0x47;
    /// `16 55`: IF filter
    pub const SUB_IF_FILTER: u8 = 0x55;
    /// `16 56`: DSP filter shape
    pub const SUB_FILTER_SHAPE: u8 = 0x56;
}

/// Operating modes selectable on the IC-7410
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingMode {
    /// Lower Sideband
    Lsb,
    /// Upper Sideband
    Usb,
    /// Amplitude Modulation
    Am,
    /// Continuous Wave
    Cw,
    /// RTTY
    Rtty,
    /// Frequency Modulation
    Fm,
    /// CW Reverse
    CwR,
    /// RTTY Reverse
    RttyR,
}

impl OperatingMode {
    /// All modes, in front-panel order
    pub const ALL: [OperatingMode; 8] = [
        Self::Cw,
        Self::CwR,
        Self::Rtty,
        Self::RttyR,
        Self::Lsb,
        Self::Usb,
        Self::Am,
        Self::Fm,
    ];

    /// CI-V mode byte
    pub fn code(&self) -> u8 {
        match self {
            Self::Lsb => 0x00,
            Self::Usb => 0x01,
            Self::Am => 0x02,
            Self::Cw => 0x03,
            Self::Rtty => 0x04,
            Self::Fm => 0x05,
            Self::CwR => 0x07,
            Self::RttyR => 0x08,
        }
    }

    /// Mode for a CI-V mode byte
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// Returns whether this is a CW mode
    pub fn is_cw(&self) -> bool {
        matches!(self, Self::Cw | Self::CwR)
    }
}

/// DSP filter selection (FIL1/FIL2/FIL3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Filter {
    Fil1,
    Fil2,
    Fil3,
}

impl Filter {
    /// CI-V filter byte
    pub fn code(&self) -> u8 {
        match self {
            Self::Fil1 => 0x01,
            Self::Fil2 => 0x02,
            Self::Fil3 => 0x03,
        }
    }

    /// Filter for a CI-V filter byte
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Fil1),
            0x02 => Some(Self::Fil2),
            0x03 => Some(Self::Fil3),
            _ => None,
        }
    }
}

/// Front-panel settings that are plain "function" toggles on the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrontPanel {
    /// IF filter 1/2/3 (0..=2)
    IfFilter(u8),
    /// DSP filter shape: false = sharp, true = soft
    SoftFilterShape(bool),
    /// Preamp off/1/2 (0..=2)
    Preamp(u8),
    /// Attenuator on/off (20 dB)
    Attenuator(bool),
    /// AGC fast/mid/slow (1..=3)
    Agc(u8),
    /// Antenna 1/2 (0..=1)
    Antenna(u8),
    /// Break-in off/semi/full (0..=2)
    BreakIn(u8),
}

impl FrontPanel {
    /// Payload bytes for this setting
    pub fn payload(&self) -> Vec<u8> {
        use opcode::*;
        match *self {
            Self::IfFilter(n) => vec![FUNCTION, SUB_IF_FILTER, n.min(2)],
            Self::SoftFilterShape(soft) => vec![FUNCTION, SUB_FILTER_SHAPE, soft as u8],
            Self::Preamp(n) => vec![FUNCTION, SUB_PREAMP, n.min(2)],
            Self::Attenuator(on) => vec![ATTENUATOR, if on { 0x20 } else { 0x00 }],
            Self::Agc(n) => vec![FUNCTION, SUB_AGC, n.clamp(1, 3)],
            Self::Antenna(n) => vec![ANTENNA, n.min(1)],
            Self::BreakIn(n) => vec![FUNCTION, SUB_BREAK_IN, n.min(2)],
        }
    }
}

/// Commands sent from the controller to the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RigCommand {
    /// Set the VFO frequency in Hz
    SetFrequency { hz: u64 },
    /// Set operating mode and DSP filter
    SetMode { mode: OperatingMode, filter: Filter },
    /// Set CW keying speed (clamped to 6..=48 wpm)
    SetCwSpeed { wpm: u32 },
    /// Set RF power (clamped to 2..=100 %)
    SetTxPower { percent: u32 },
    /// Change a front-panel function
    SetFrontPanel(FrontPanel),
    /// Read the VFO frequency
    ReadFrequency,
    /// Read the S-meter level
    ReadSMeter,
    /// Read mode and filter
    ReadMode,
}

impl RigCommand {
    /// Payload bytes (between preamble and terminator)
    pub fn payload(&self) -> Vec<u8> {
        use opcode::*;
        match *self {
            Self::SetFrequency { hz } => {
                let mut payload = vec![SET_FREQUENCY];
                payload.extend(frequency_to_bcd(hz));
                payload
            }
            Self::SetMode { mode, filter } => vec![SET_MODE, mode.code(), filter.code()],
            Self::SetCwSpeed { wpm } => {
                let mut payload = vec![LEVEL, SUB_KEY_SPEED];
                payload.extend(level_to_bcd(cw_speed_level(wpm)));
                payload
            }
            Self::SetTxPower { percent } => {
                let mut payload = vec![LEVEL, SUB_RF_POWER];
                payload.extend(level_to_bcd(tx_power_level(percent)));
                payload
            }
            Self::SetFrontPanel(setting) => setting.payload(),
            Self::ReadFrequency => vec![READ_FREQUENCY],
            Self::ReadSMeter => vec![METER, SUB_S_METER],
            Self::ReadMode => vec![READ_MODE],
        }
    }

    /// Returns true if the rig answers with a telemetry frame
    pub fn is_query(&self) -> bool {
        matches!(self, Self::ReadFrequency | Self::ReadSMeter | Self::ReadMode)
    }

    /// Short name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetFrequency { .. } => "set frequency",
            Self::SetMode { .. } => "set mode",
            Self::SetCwSpeed { .. } => "set CW speed",
            Self::SetTxPower { .. } => "set TX power",
            Self::SetFrontPanel(_) => "set front panel",
            Self::ReadFrequency => "read frequency",
            Self::ReadSMeter => "read S-meter",
            Self::ReadMode => "read mode",
        }
    }
}
