//! Rig state tracking

use civ_protocol::{Filter, FrontPanel, OperatingMode};
use serde::{Deserialize, Serialize};

/// Last known state of the rig
///
/// Set operations update this optimistically from the request values once
/// the rig has echoed the command; polls overwrite it with decoded readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigState {
    /// Current operating mode
    pub mode: OperatingMode,
    /// Current DSP filter
    pub filter: Filter,
    /// Current VFO frequency in Hz
    pub frequency_hz: u64,
    /// Last S-meter reading (0..=255)
    pub s_meter: u16,
    /// CW keying speed last set, in wpm (after clamping)
    pub cw_speed_wpm: Option<u32>,
    /// RF power last set, in percent (after clamping)
    pub tx_power_percent: Option<u32>,
    /// IF filter 0..=2
    pub if_filter: Option<u8>,
    /// DSP filter shape is soft
    pub soft_filter_shape: Option<bool>,
    /// Preamp setting 0..=2
    pub preamp: Option<u8>,
    /// Attenuator engaged
    pub attenuator: Option<bool>,
    /// AGC setting 1..=3
    pub agc: Option<u8>,
    /// Antenna 0..=1
    pub antenna: Option<u8>,
    /// Break-in setting 0..=2
    pub break_in: Option<u8>,
}

impl Default for RigState {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Cw,
            filter: Filter::Fil1,
            frequency_hz: 0,
            s_meter: 0,
            cw_speed_wpm: None,
            tx_power_percent: None,
            if_filter: None,
            soft_filter_shape: None,
            preamp: None,
            attenuator: None,
            agc: None,
            antenna: None,
            break_in: None,
        }
    }
}

impl RigState {
    /// Record a front-panel setting the rig has accepted
    pub fn apply_front_panel(&mut self, setting: FrontPanel) {
        match setting {
            FrontPanel::IfFilter(n) => self.if_filter = Some(n.min(2)),
            FrontPanel::SoftFilterShape(soft) => self.soft_filter_shape = Some(soft),
            FrontPanel::Preamp(n) => self.preamp = Some(n.min(2)),
            FrontPanel::Attenuator(on) => self.attenuator = Some(on),
            FrontPanel::Agc(n) => self.agc = Some(n.clamp(1, 3)),
            FrontPanel::Antenna(n) => self.antenna = Some(n.min(1)),
            FrontPanel::BreakIn(n) => self.break_in = Some(n.min(2)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = RigState::default();
        assert_eq!(state.mode, OperatingMode::Cw);
        assert_eq!(state.filter, Filter::Fil1);
        assert_eq!(state.frequency_hz, 0);
        assert!(state.agc.is_none());
    }

    #[test]
    fn test_front_panel_clamped_like_payload() {
        let mut state = RigState::default();
        state.apply_front_panel(FrontPanel::Agc(7));
        state.apply_front_panel(FrontPanel::Attenuator(true));
        assert_eq!(state.agc, Some(3));
        assert_eq!(state.attenuator, Some(true));
    }
}
