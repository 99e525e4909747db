//! IC-7410 CI-V Protocol Library
//!
//! This crate provides framing, command encoding and reply decoding for the
//! Icom CI-V dialect spoken by the IC-7410:
//!
//! - **Framing**: `FE FE [to] [from] [payload] FD` with a bounded terminator scan
//! - **Commands**: frequency, mode/filter, CW speed, TX power and front-panel functions
//! - **Telemetry**: fixed-size frequency, S-meter and mode replies
//!
//! # Example
//!
//! ```rust
//! use civ_protocol::{frame, RigCommand};
//!
//! let payload = RigCommand::SetFrequency { hz: 14_250_000 }.payload();
//! let bytes = frame::encode(&payload).unwrap();
//! assert_eq!(
//!     bytes,
//!     vec![0xFE, 0xFE, 0x80, 0xE0, 0x05, 0x00, 0x00, 0x25, 0x14, 0xFD]
//! );
//! assert!(frame::frames_equal(&bytes, &bytes));
//! ```

pub mod bcd;
pub mod command;
pub mod error;
pub mod frame;
pub mod telemetry;

pub use command::{Filter, FrontPanel, OperatingMode, RigCommand};
pub use error::{FrameError, ParseError};
pub use frame::{FrameDecoder, Preamble, MAX_FRAME_LEN, TERMINATOR};
pub use telemetry::Ack;
