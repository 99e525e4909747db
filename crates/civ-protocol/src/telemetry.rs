//! Decoding of rig → controller replies
//!
//! Query replies have a fixed size per query type. The frequency reply is
//! read most significant byte first (bytes 8..=5 printed as hex and taken
//! as a decimal number), which is the mirror image of how
//! [`frequency_to_bcd`](crate::bcd::frequency_to_bcd) packs it. The fifth
//! BCD byte (hundreds of MHz) is not part of the reading.

use crate::bcd::hex_digits_to_decimal;
use crate::command::{opcode, Filter, OperatingMode};
use crate::error::ParseError;
use crate::frame::{encode_with, is_valid_frame, Preamble, TERMINATOR};

/// Size of the reply to a frequency query
pub const FREQUENCY_REPLY_LEN: usize = 11;
/// Size of the reply to an S-meter query
pub const S_METER_REPLY_LEN: usize = 9;
/// Size of the reply to a mode query
pub const MODE_REPLY_LEN: usize = 8;

/// Acknowledgement sent by the rig after a set command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ack {
    /// FB: command accepted
    Ok,
    /// FA: command rejected
    Ng,
}

fn check_len(frame: &[u8], expected: usize) -> Result<(), ParseError> {
    if frame.len() != expected {
        return Err(ParseError::TelemetryLengthMismatch {
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Decode the frequency (Hz) from a frequency query reply
pub fn decode_frequency(frame: &[u8]) -> Result<u64, ParseError> {
    check_len(frame, FREQUENCY_REPLY_LEN)?;
    hex_digits_to_decimal(&[frame[8], frame[7], frame[6], frame[5]])
}

/// Decode the S-meter level (0..=255) from an S-meter query reply
pub fn decode_s_meter(frame: &[u8]) -> Result<u16, ParseError> {
    check_len(frame, S_METER_REPLY_LEN)?;
    Ok(hex_digits_to_decimal(&[frame[6], frame[7]])? as u16)
}

/// Decode mode and filter from a mode query reply
pub fn decode_mode(frame: &[u8]) -> Result<(OperatingMode, Filter), ParseError> {
    check_len(frame, MODE_REPLY_LEN)?;
    let mode = OperatingMode::from_code(frame[5])
        .ok_or_else(|| ParseError::InvalidFrame(format!("unknown mode 0x{:02X}", frame[5])))?;
    let filter = Filter::from_code(frame[6])
        .ok_or_else(|| ParseError::InvalidFrame(format!("unknown filter 0x{:02X}", frame[6])))?;
    Ok((mode, filter))
}

/// Classify an acknowledgement frame
pub fn decode_ack(frame: &[u8]) -> Option<Ack> {
    if !is_valid_frame(frame) || frame.len() != 6 {
        return None;
    }
    match frame[4] {
        opcode::OK => Some(Ack::Ok),
        opcode::NG => Some(Ack::Ng),
        _ => None,
    }
}

/// Build an acknowledgement frame as the rig sends it
pub fn ack_frame(preamble: Preamble, ack: Ack) -> Vec<u8> {
    let code = match ack {
        Ack::Ok => opcode::OK,
        Ack::Ng => opcode::NG,
    };
    let mut frame = preamble.bytes().to_vec();
    frame.push(code);
    frame.push(TERMINATOR);
    frame
}

/// Build a frequency query reply carrying `hz`
pub fn frequency_reply(preamble: Preamble, hz: u64) -> Vec<u8> {
    let mut payload = vec![opcode::READ_FREQUENCY];
    payload.extend(crate::bcd::frequency_to_bcd(hz));
    payload.push(((hz / 100_000_000) % 10) as u8);
    // Every payload byte is BCD and therefore below the terminator
    encode_with(preamble, &payload).unwrap_or_default()
}

/// Build an S-meter query reply carrying `level` (0..=255)
pub fn s_meter_reply(preamble: Preamble, level: u16) -> Vec<u8> {
    let level = level.min(255);
    let high = (level / 100) as u8;
    let low = ((((level % 100) / 10) << 4) | (level % 10)) as u8;
    encode_with(
        preamble,
        &[opcode::METER, opcode::SUB_S_METER, high, low],
    )
    .unwrap_or_default()
}

/// Build a mode query reply
pub fn mode_reply(preamble: Preamble, mode: OperatingMode, filter: Filter) -> Vec<u8> {
    encode_with(preamble, &[opcode::READ_MODE, mode.code(), filter.code()]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_frequency() {
        let frame = [
            0xFE, 0xFE, 0xE0, 0x80, 0x03, 0x00, 0x00, 0x25, 0x14, 0x00, 0xFD,
        ];
        assert_eq!(decode_frequency(&frame), Ok(14_250_000));
    }

    #[test]
    fn test_decode_frequency_wrong_length() {
        let frame = [0xFE, 0xFE, 0xE0, 0x80, 0x03, 0x00, 0x00, 0x25, 0x14, 0xFD];
        assert_eq!(
            decode_frequency(&frame),
            Err(ParseError::TelemetryLengthMismatch {
                expected: 11,
                actual: 10
            })
        );
    }

    #[test]
    fn test_frequency_reply_roundtrip() {
        let frame = frequency_reply(Preamble::REPLY, 7_026_130);
        assert_eq!(frame.len(), FREQUENCY_REPLY_LEN);
        assert_eq!(decode_frequency(&frame), Ok(7_026_130));
    }

    #[test]
    fn test_decode_s_meter() {
        let frame = [0xFE, 0xFE, 0xE0, 0x80, 0x15, 0x02, 0x01, 0x20, 0xFD];
        assert_eq!(decode_s_meter(&frame), Ok(120));
        assert_eq!(
            decode_s_meter(&s_meter_reply(Preamble::REPLY, 241)),
            Ok(241)
        );
    }

    #[test]
    fn test_decode_s_meter_invalid_bcd() {
        let frame = [0xFE, 0xFE, 0xE0, 0x80, 0x15, 0x02, 0x0A, 0x20, 0xFD];
        assert_eq!(decode_s_meter(&frame), Err(ParseError::InvalidBcd(0x0A)));
    }

    #[test]
    fn test_decode_mode() {
        let frame = mode_reply(Preamble::REPLY, OperatingMode::Usb, Filter::Fil3);
        assert_eq!(frame.len(), MODE_REPLY_LEN);
        assert_eq!(decode_mode(&frame), Ok((OperatingMode::Usb, Filter::Fil3)));
    }

    #[test]
    fn test_ack_frames() {
        let ok = ack_frame(Preamble::REPLY, Ack::Ok);
        assert_eq!(ok, vec![0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD]);
        assert_eq!(decode_ack(&ok), Some(Ack::Ok));
        assert_eq!(decode_ack(&ack_frame(Preamble::REPLY, Ack::Ng)), Some(Ack::Ng));
        assert_eq!(decode_ack(&[0xFE, 0xFE, 0xE0, 0x80, 0x03, 0xFD]), None);
    }
}
