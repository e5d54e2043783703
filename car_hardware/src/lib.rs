//! Hardware backends for the vehicle controller.
//!
//! Simulated relays, hall sensor and a stdio/device line transport are always
//! available. With the `hardware` feature the rppal-based GPIO relay bank,
//! hall-effect sensor and UART transport are compiled in.

pub mod error;
pub mod sim;
pub mod transport;
pub mod util;

#[cfg(feature = "hardware")]
pub mod gpio;
#[cfg(feature = "hardware")]
pub mod uart;

pub use sim::{SimWheel, SimulatedMagnetSensor, SimulatedRelayBank};
pub use transport::LineTransport;
