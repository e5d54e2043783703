#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core vehicle control logic (hardware-agnostic).
//!
//! All hardware interactions go through the `car_traits` capabilities
//! (`RelayBank`, `Motor`, `MagnetSensor`, `Transport`).
//!
//! ## Architecture
//!
//! - **Protocol**: frame codec and typed payloads (`protocol` module)
//! - **Dispatch**: command route table, one response per request (`dispatch`)
//! - **Control**: run/stop state machine and the background control loop (`controller`, `stage`)
//! - **Odometer**: magnet edges to distance and velocity (`odometer`)
//! - **Motor**: relay H-bridge with a polarity interlock (`motor`)
//! - **State**: the lock-guarded distance record (`state`)
//! - **Errors**: numeric taxonomy shared with the console (`error`)
//!
//! Distances are centimetres, velocities cm/s, wire timestamps unix seconds.

pub mod config;
pub mod controller;
pub mod conversions;
pub mod dispatch;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod motor;
pub mod odometer;
pub mod protocol;
pub mod server;
pub mod stage;
pub mod state;
pub mod util;

pub use config::{ControllerCfg, MotionCfg, OdometerCfg, ProtocolCfg, RunConfig, VehicleCfg};
pub use controller::{MotionController, PowerCutter};
pub use dispatch::Dispatcher;
pub use error::{ControlError, ErrorVariant, HwFault, ProtocolError};
pub use motor::RelayMotor;
pub use odometer::Odometer;
pub use server::serve;
pub use stage::Stage;
pub use state::{DistanceSnapshot, SharedState};
