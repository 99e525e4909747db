//! IC-7410 Rig Control
//!
//! Byte transport and request/response engine on top of `civ-protocol`.
//!
//! - [`SerialTransport`]: frame-at-a-time reads and writes with a timeout
//! - [`RigProtocolEngine`]: echo-verified set and query operations
//! - [`RigState`]: last known rig state, published through a `watch` channel
//! - [`StatusPoller`]: background task polling frequency and S-meter
//!
//! The transport and engine are generic over any `AsyncRead + AsyncWrite`
//! stream, so tests drive them against `rig-sim` over `tokio::io::duplex()`.

pub mod engine;
pub mod error;
pub mod poller;
pub mod state;
pub mod transport;

pub use engine::{EngineConfig, RigProtocolEngine, StatusPoll};
pub use error::RigError;
pub use poller::{PollerCommand, StatusPoller, DEFAULT_POLL_INTERVAL};
pub use state::RigState;
pub use transport::{list_ports, SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT};
