//! IC-7410 Simulation Library
//!
//! A stand-in for the rig on the other end of the CI-V line, used to test
//! the controller without hardware:
//!
//! - **SimulatedRig**: echoes frames, acknowledges sets and answers queries
//! - **run_simulated_rig**: actor task serving a `SimulatedRig` over any async stream
//!
//! # Example
//!
//! ```rust
//! use civ_protocol::{frame, telemetry, RigCommand};
//! use rig_sim::SimulatedRig;
//!
//! let mut rig = SimulatedRig::new();
//! rig.set_frequency(14_250_000);
//!
//! let query = frame::encode(&RigCommand::ReadFrequency.payload()).unwrap();
//! rig.process_bytes(&query);
//!
//! assert_eq!(rig.take_output(), Some(query));
//! let reply = rig.take_output().unwrap();
//! assert_eq!(telemetry::decode_frequency(&reply), Ok(14_250_000));
//! ```

pub mod rig;
pub mod task;

pub use rig::{Faults, SimulatedRig, SimulatedRigConfig};
pub use task::{run_simulated_rig, SimulatedRigCommand, SimulatedRigEvent};
