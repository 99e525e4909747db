//! CI-V frame encoding and delimiting
//!
//! # Frame Format
//! ```text
//! FE FE [to] [from] [payload...] FD
//! ```
//!
//! - `FE FE`: Preamble bytes
//! - `to`: Destination address (0x80 for the IC-7410, 0xE0 for the controller)
//! - `from`: Source address
//! - `payload`: Command code, optional sub-command and data
//! - `FD`: Terminator
//!
//! The IC-7410 echoes every frame it receives on the shared CI-V line, so a
//! command is acknowledged first by its own bytes coming back verbatim.

use tracing::trace;

use crate::error::FrameError;

/// CI-V frame preamble byte
pub const PREAMBLE: u8 = 0xFE;
/// CI-V frame terminator byte
pub const TERMINATOR: u8 = 0xFD;
/// Default controller address
pub const CONTROLLER_ADDR: u8 = 0xE0;
/// Factory CI-V address of the IC-7410
pub const IC7410_ADDR: u8 = 0x80;

/// Maximum frame length, preamble and terminator included
pub const MAX_FRAME_LEN: usize = 256;
/// Bytes added around a payload (4-byte preamble + terminator)
pub const FRAME_OVERHEAD: usize = 5;
/// Largest payload that still fits in one frame
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - FRAME_OVERHEAD;

/// The 4-byte frame header: two preamble bytes plus routing addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Preamble {
    /// Destination address
    pub to: u8,
    /// Source address
    pub from: u8,
}

impl Preamble {
    /// Controller → IC-7410 header (`FE FE 80 E0`)
    pub const COMMAND: Preamble = Preamble {
        to: IC7410_ADDR,
        from: CONTROLLER_ADDR,
    };

    /// IC-7410 → controller header (`FE FE E0 80`)
    pub const REPLY: Preamble = Preamble {
        to: CONTROLLER_ADDR,
        from: IC7410_ADDR,
    };

    /// Header for a controller talking to the rig at `rig_addr`
    pub fn to_rig(rig_addr: u8, controller_addr: u8) -> Self {
        Self {
            to: rig_addr,
            from: controller_addr,
        }
    }

    /// The header the rig uses when answering this one
    pub fn reversed(&self) -> Self {
        Self {
            to: self.from,
            from: self.to,
        }
    }

    /// Wire bytes of this header
    pub fn bytes(&self) -> [u8; 4] {
        [PREAMBLE, PREAMBLE, self.to, self.from]
    }
}

impl Default for Preamble {
    fn default() -> Self {
        Self::COMMAND
    }
}

/// Build a complete frame around `payload`
pub fn encode_with(preamble: Preamble, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = payload.len() + FRAME_OVERHEAD;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::PayloadTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    if let Some(offset) = payload.iter().position(|&b| b == TERMINATOR) {
        return Err(FrameError::ReservedTerminator { offset });
    }

    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(&preamble.bytes());
    frame.extend_from_slice(payload);
    frame.push(TERMINATOR);
    Ok(frame)
}

/// Build a controller → IC-7410 frame around `payload`
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode_with(Preamble::COMMAND, payload)
}

/// Length of the first frame in `buffer`, terminator included
///
/// The scan stops after [`MAX_FRAME_LEN`] bytes so a corrupt stream cannot
/// make it run away.
pub fn frame_length(buffer: &[u8], terminator: u8) -> Result<usize, FrameError> {
    let limit = buffer.len().min(MAX_FRAME_LEN);
    buffer[..limit]
        .iter()
        .position(|&b| b == terminator)
        .map(|pos| pos + 1)
        .ok_or(FrameError::MalformedFrame { scanned: limit })
}

/// Compare two frames byte-for-byte up to and including the terminator
///
/// Frames of different length, or without a terminator, never compare equal.
pub fn frames_equal(a: &[u8], b: &[u8]) -> bool {
    match (frame_length(a, TERMINATOR), frame_length(b, TERMINATOR)) {
        (Ok(len_a), Ok(len_b)) => len_a == len_b && a[..len_a] == b[..len_b],
        _ => false,
    }
}

/// The payload between header and terminator of a complete frame
pub fn payload(frame: &[u8]) -> Option<&[u8]> {
    if is_valid_frame(frame) {
        Some(&frame[4..frame.len() - 1])
    } else {
        None
    }
}

/// Check if data looks like a complete CI-V frame
pub fn is_valid_frame(data: &[u8]) -> bool {
    data.len() >= FRAME_OVERHEAD + 1
        && data.len() <= MAX_FRAME_LEN
        && data[0] == PREAMBLE
        && data[1] == PREAMBLE
        && data[data.len() - 1] == TERMINATOR
}

/// Header of a complete frame
pub fn preamble_of(frame: &[u8]) -> Option<Preamble> {
    if is_valid_frame(frame) {
        Some(Preamble {
            to: frame[2],
            from: frame[3],
        })
    } else {
        None
    }
}

/// Streaming CI-V frame decoder
///
/// Accepts arbitrary chunks of line data and yields whole frames. Bytes
/// before a preamble are discarded.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Push raw bytes into the decoder's buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent buffer overflow
        if self.buffer.len() > MAX_FRAME_LEN * 4 {
            let start = self.buffer.len() - MAX_FRAME_LEN;
            self.buffer.drain(..start);
        }
    }

    /// Find the start of a frame (FE FE sequence)
    fn find_preamble(&self) -> Option<usize> {
        self.buffer
            .windows(2)
            .position(|w| w[0] == PREAMBLE && w[1] == PREAMBLE)
    }

    /// Try to extract the next complete frame
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let preamble_pos = self.find_preamble()?;
            if preamble_pos > 0 {
                self.buffer.drain(..preamble_pos);
            }

            match frame_length(&self.buffer, TERMINATOR) {
                Ok(len) => {
                    let frame: Vec<u8> = self.buffer.drain(..len).collect();
                    if is_valid_frame(&frame) {
                        return Some(frame);
                    }
                    trace!("Discarding runt CI-V frame: {:02X?}", frame);
                }
                Err(FrameError::MalformedFrame { scanned }) if scanned >= MAX_FRAME_LEN => {
                    trace!("No terminator within {} bytes, resyncing", scanned);
                    self.buffer.drain(..2);
                }
                Err(_) => return None,
            }
        }
    }

    /// Number of buffered bytes not yet part of a frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_adds_preamble_and_terminator() {
        let frame = encode(&[0x03]).unwrap();
        assert_eq!(frame, vec![0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD]);
    }

    #[test]
    fn test_reply_preamble_is_reversed() {
        assert_eq!(Preamble::COMMAND.reversed(), Preamble::REPLY);
        assert_eq!(Preamble::REPLY.bytes(), [0xFE, 0xFE, 0xE0, 0x80]);
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0x00; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode(&payload),
            Err(FrameError::PayloadTooLarge { len: 257, max: 256 })
        );
        assert!(encode(&vec![0x00; MAX_PAYLOAD_LEN]).is_ok());
    }

    #[test]
    fn test_reserved_terminator_rejected() {
        assert_eq!(
            encode(&[0x14, 0xFD]),
            Err(FrameError::ReservedTerminator { offset: 1 })
        );
    }

    #[test]
    fn test_frame_length_stops_at_first_terminator() {
        let buf = [0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD, 0xFE, 0xFE];
        assert_eq!(frame_length(&buf, TERMINATOR), Ok(6));
    }

    #[test]
    fn test_frame_length_is_bounded() {
        let buf = vec![0x00; 1000];
        assert_eq!(
            frame_length(&buf, TERMINATOR),
            Err(FrameError::MalformedFrame { scanned: 256 })
        );
        assert_eq!(
            frame_length(&[0xFE, 0xFE], TERMINATOR),
            Err(FrameError::MalformedFrame { scanned: 2 })
        );
    }

    #[test]
    fn test_frames_equal_ignores_trailing_bytes() {
        let a = [0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD];
        let b = [0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD, 0x12, 0x34];
        assert!(frames_equal(&a, &b));
    }

    #[test]
    fn test_frames_equal_rejects_different_lengths() {
        let a = [0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD];
        let b = [0xFE, 0xFE, 0x80, 0xE0, 0x03, 0x00, 0xFD];
        assert!(!frames_equal(&a, &b));
        assert!(!frames_equal(&a, &a[..5]));
    }

    #[test]
    fn test_payload_extraction() {
        let frame = encode(&[0x15, 0x02]).unwrap();
        assert_eq!(payload(&frame), Some(&[0x15, 0x02][..]));
        assert_eq!(preamble_of(&frame), Some(Preamble::COMMAND));
        assert_eq!(payload(&[0xFE, 0xFE, 0xFD]), None);
    }

    #[test]
    fn test_streaming_decode() {
        let mut decoder = FrameDecoder::new();

        // Line noise, then a partial frame
        decoder.push_bytes(&[0x00, 0x13, 0xFE, 0xFE, 0x80]);
        assert!(decoder.next_frame().is_none());

        decoder.push_bytes(&[0xE0, 0x03, 0xFD, 0xFE, 0xFE, 0x80, 0xE0, 0x04, 0xFD]);
        assert_eq!(
            decoder.next_frame(),
            Some(vec![0xFE, 0xFE, 0x80, 0xE0, 0x03, 0xFD])
        );
        assert_eq!(
            decoder.next_frame(),
            Some(vec![0xFE, 0xFE, 0x80, 0xE0, 0x04, 0xFD])
        );
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_streaming_decode_skips_runt() {
        let mut decoder = FrameDecoder::new();
        decoder.push_bytes(&[0xFE, 0xFE, 0xFD, 0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD]);
        assert_eq!(
            decoder.next_frame(),
            Some(vec![0xFE, 0xFE, 0xE0, 0x80, 0xFB, 0xFD])
        );
    }

    fn payload_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..TERMINATOR, 1..=MAX_PAYLOAD_LEN)
    }

    proptest! {
        #[test]
        fn encoded_length_is_payload_plus_overhead(payload in payload_bytes()) {
            let frame = encode(&payload).unwrap();
            prop_assert_eq!(frame_length(&frame, TERMINATOR), Ok(payload.len() + FRAME_OVERHEAD));
        }

        #[test]
        fn frames_equal_is_reflexive(payload in payload_bytes()) {
            let frame = encode(&payload).unwrap();
            prop_assert!(frames_equal(&frame, &frame));
        }

        #[test]
        fn any_changed_byte_breaks_equality(
            payload in payload_bytes(),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=0x7F,
        ) {
            let frame = encode(&payload).unwrap();
            let mut other = frame.clone();
            let i = index.index(frame.len() - 1);
            other[i] ^= flip;
            prop_assert!(!frames_equal(&frame, &other));
        }
    }
}
