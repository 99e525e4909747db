//! BCD packing used by IC-7410 command payloads and replies
//!
//! Frequencies go out as 8 decimal digits, least significant first, two per
//! byte with the less significant digit in the low nibble. Level settings
//! (CW speed, TX power) are scaled to 0..=255 and sent as a hundreds byte
//! followed by one BCD byte for the remaining two digits.

use crate::error::ParseError;

/// Number of BCD bytes in a frequency payload
pub const FREQUENCY_BYTES: usize = 4;
/// Largest frequency expressible in a frequency payload
pub const MAX_FREQUENCY_HZ: u64 = 99_999_999;

/// Pack the low 8 decimal digits of `hz` into 4 bytes
///
/// 14.250.000 Hz → digits from LSB 0,0,0,0,5,2,4,1 → `00 00 25 14`.
/// Higher digits are dropped, as the rig firmware expects exactly 4 bytes.
pub fn frequency_to_bcd(hz: u64) -> [u8; FREQUENCY_BYTES] {
    let mut digits = [0u8; FREQUENCY_BYTES * 2];
    let mut remaining = hz;
    for digit in digits.iter_mut() {
        *digit = (remaining % 10) as u8;
        remaining /= 10;
    }

    let mut out = [0u8; FREQUENCY_BYTES];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (digits[2 * i + 1] << 4) | digits[2 * i];
    }
    out
}

/// Inverse of [`frequency_to_bcd`]
pub fn bcd_to_frequency(data: &[u8]) -> Result<u64, ParseError> {
    let mut freq: u64 = 0;
    let mut multiplier: u64 = 1;

    for &byte in data {
        let low = (byte & 0x0F) as u64;
        let high = ((byte >> 4) & 0x0F) as u64;

        if low > 9 || high > 9 {
            return Err(ParseError::InvalidBcd(byte));
        }

        freq += low * multiplier;
        multiplier *= 10;
        freq += high * multiplier;
        multiplier *= 10;
    }

    Ok(freq)
}

/// Read bytes as if printed with `%02x` in the given order and parsed as decimal
///
/// Telemetry replies are decoded this way: the byte order is chosen by the
/// caller, and every nibble must be a decimal digit.
pub fn hex_digits_to_decimal(bytes: &[u8]) -> Result<u64, ParseError> {
    let mut value: u64 = 0;
    for &byte in bytes {
        let high = (byte >> 4) as u64;
        let low = (byte & 0x0F) as u64;
        if high > 9 || low > 9 {
            return Err(ParseError::InvalidBcd(byte));
        }
        value = value * 100 + high * 10 + low;
    }
    Ok(value)
}

/// Split a 0..=255 level into the `[hundreds, tens|ones]` wire bytes
pub fn level_to_bcd(level: u8) -> [u8; 2] {
    let hundreds = level / 100;
    let tens = (level % 100) / 10;
    let ones = level % 10;
    [hundreds, (tens << 4) | ones]
}

/// Inverse of [`level_to_bcd`]
pub fn bcd_to_level(data: [u8; 2]) -> Result<u16, ParseError> {
    Ok(hex_digits_to_decimal(&data)? as u16)
}

/// CW keying speed range accepted by the rig, in words per minute
pub const CW_SPEED_RANGE: (u32, u32) = (6, 48);
/// RF power range accepted by the rig, in percent
pub const TX_POWER_RANGE: (u32, u32) = (2, 100);

/// Scale a CW speed to the rig's 0..=255 level, clamping to 6..=48 wpm
pub fn cw_speed_level(wpm: u32) -> u8 {
    let (min, max) = CW_SPEED_RANGE;
    let wpm = wpm.clamp(min, max);
    (255 * (wpm - min) / (max - min)) as u8
}

/// Scale a TX power percentage to the rig's level, clamping to 2..=100 %
///
/// The divisor is 100 rather than the 98 the range spans, so full power
/// lands on 249. Existing rig setups were calibrated against this curve.
pub fn tx_power_level(percent: u32) -> u8 {
    let (min, max) = TX_POWER_RANGE;
    let percent = percent.clamp(min, max);
    (255.0 * (percent - min) as f64 / 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frequency_to_bcd() {
        // 14250000 -> digits from LSB: 0,0,0,0,5,2,4,1
        assert_eq!(frequency_to_bcd(14_250_000), [0x00, 0x00, 0x25, 0x14]);
        assert_eq!(frequency_to_bcd(7_026_130), [0x30, 0x61, 0x02, 0x07]);
    }

    #[test]
    fn test_frequency_truncated_to_eight_digits() {
        assert_eq!(frequency_to_bcd(144_200_000), frequency_to_bcd(44_200_000));
    }

    #[test]
    fn test_bcd_to_frequency_rejects_hex_nibble() {
        assert_eq!(
            bcd_to_frequency(&[0x00, 0x1A]),
            Err(ParseError::InvalidBcd(0x1A))
        );
    }

    #[test]
    fn test_hex_digits_to_decimal() {
        assert_eq!(hex_digits_to_decimal(&[0x14, 0x25, 0x00, 0x00]), Ok(14_250_000));
        assert_eq!(hex_digits_to_decimal(&[0x01, 0x20]), Ok(120));
        assert_eq!(hex_digits_to_decimal(&[0xF0]), Err(ParseError::InvalidBcd(0xF0)));
    }

    #[test]
    fn test_level_to_bcd() {
        assert_eq!(level_to_bcd(0), [0x00, 0x00]);
        assert_eq!(level_to_bcd(127), [0x01, 0x27]);
        assert_eq!(level_to_bcd(255), [0x02, 0x55]);
        assert_eq!(bcd_to_level([0x02, 0x55]), Ok(255));
    }

    #[test]
    fn test_cw_speed_clamped() {
        assert_eq!(cw_speed_level(3), cw_speed_level(6));
        assert_eq!(cw_speed_level(60), cw_speed_level(48));
        assert_eq!(cw_speed_level(6), 0);
        assert_eq!(cw_speed_level(48), 255);
        // 255 * 14 / 42 = 85
        assert_eq!(cw_speed_level(20), 85);
    }

    #[test]
    fn test_tx_power_curve() {
        assert_eq!(tx_power_level(0), 0);
        assert_eq!(tx_power_level(2), 0);
        // 255 * 48 / 100 = 122.4
        assert_eq!(tx_power_level(50), 122);
        assert_eq!(tx_power_level(100), 249);
        assert_eq!(tx_power_level(150), 249);
    }

    proptest! {
        #[test]
        fn frequency_bcd_roundtrip(hz in 0u64..=MAX_FREQUENCY_HZ) {
            let bcd = frequency_to_bcd(hz);
            prop_assert_eq!(bcd_to_frequency(&bcd), Ok(hz));
        }

        #[test]
        fn frequency_bytes_are_decimal(hz in any::<u64>()) {
            for byte in frequency_to_bcd(hz) {
                prop_assert!(byte & 0x0F <= 9 && byte >> 4 <= 9);
            }
        }
    }
}
