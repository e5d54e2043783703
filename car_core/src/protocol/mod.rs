//! Line protocol spoken with the operator console.

pub mod frame;
mod json;
pub mod messages;

pub use frame::{Command, Direction, Frame, decode, encode};
pub use messages::{
    DistanceInfo, ErrorResponse, Metadata, Payload, PingArgs, PingResponse, StartArgs,
    StaticStatusResponse, StatusResponse,
};
