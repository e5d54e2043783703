//! Typed payloads carried by frames.
//!
//! Which payload a frame carries is fixed by its direction and command; see
//! [`Shape::of`].

use serde::{Deserialize, Serialize};

use super::frame::{Command, Direction};
use super::json::to_wire_json;
use crate::error::{ErrorVariant, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Unix timestamp (seconds) at the sender.
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingArgs {
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartArgs {
    /// Target distance in cm.
    pub distance: f64,
    pub reverse_brake: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingResponse {
    pub sent_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticStatusResponse {
    pub number_of_magnets: u32,
    pub wheel_diameter: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceInfo {
    pub distance: f64,
    pub velocity: f64,
    pub magnet_hit_counter: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    /// Whole seconds since the controller booted.
    pub uptime: u64,
    /// Whole seconds since the current run started, 0 without a run.
    pub runtime: u64,
    pub distance: DistanceInfo,
    pub stage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_variant: u8,
    pub message: String,
}

impl From<&ProtocolError> for ErrorResponse {
    fn from(e: &ProtocolError) -> Self {
        Self {
            error_variant: e.code(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `{}`
    Empty,
    Ping(PingArgs),
    Start(StartArgs),
    PingReply(PingResponse),
    StaticStatus(StaticStatusResponse),
    Status(StatusResponse),
    Error(ErrorResponse),
}

/// Payload type a frame must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Empty,
    Ping,
    Start,
    PingReply,
    StaticStatus,
    Status,
    Error,
}

impl Shape {
    pub fn of(direction: Direction, command: Command) -> Shape {
        match (direction, command) {
            (Direction::Request, Command::Ping) => Shape::Ping,
            (Direction::Request, Command::Start) => Shape::Start,
            (Direction::Request, _) => Shape::Empty,
            (Direction::Response, Command::Ping) => Shape::PingReply,
            (Direction::Response, Command::Start | Command::Stop) => Shape::Empty,
            (Direction::Response, Command::StaticStatus) => Shape::StaticStatus,
            (Direction::Response, Command::Status) => Shape::Status,
            (Direction::Response, Command::Error) => Shape::Error,
        }
    }
}

fn type_error(direction: Direction, detail: impl Into<String>) -> ProtocolError {
    let variant = match direction {
        Direction::Request => ErrorVariant::RequestTypeError,
        Direction::Response => ErrorVariant::ResponseTypeError,
    };
    ProtocolError::new(variant, detail)
}

fn other_error(direction: Direction, detail: impl Into<String>) -> ProtocolError {
    let variant = match direction {
        Direction::Request => ErrorVariant::RequestOtherError,
        Direction::Response => ErrorVariant::ResponseOtherError,
    };
    ProtocolError::new(variant, detail)
}

fn check_unsigned(direction: Direction, field: &str, v: f64) -> Result<(), ProtocolError> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(type_error(
            direction,
            format!("{field} must be a non-negative number, got {v}"),
        ))
    }
}

fn check_finite(direction: Direction, field: &str, v: f64) -> Result<(), ProtocolError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(type_error(direction, format!("{field} must be finite")))
    }
}

impl Payload {
    pub fn shape(&self) -> Shape {
        match self {
            Payload::Empty => Shape::Empty,
            Payload::Ping(_) => Shape::Ping,
            Payload::Start(_) => Shape::Start,
            Payload::PingReply(_) => Shape::PingReply,
            Payload::StaticStatus(_) => Shape::StaticStatus,
            Payload::Status(_) => Shape::Status,
            Payload::Error(_) => Shape::Error,
        }
    }

    /// Value constraints beyond what the JSON types express.
    pub fn validate(&self, direction: Direction) -> Result<(), ProtocolError> {
        match self {
            Payload::Empty | Payload::Error(_) => Ok(()),
            Payload::Ping(a) => check_finite(direction, "time", a.time),
            Payload::Start(a) => check_unsigned(direction, "distance", a.distance),
            Payload::PingReply(r) => check_finite(direction, "sent_time", r.sent_time),
            Payload::StaticStatus(r) => {
                check_unsigned(direction, "wheel_diameter", r.wheel_diameter)
            }
            Payload::Status(r) => {
                check_unsigned(direction, "distance.distance", r.distance.distance)?;
                check_unsigned(direction, "distance.velocity", r.distance.velocity)
            }
        }
    }

    /// Parse the payload segment of a frame.
    ///
    /// Malformed JSON is an arguments error; well-formed JSON of the wrong
    /// shape is a type error.
    pub fn decode(direction: Direction, command: Command, text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::new(ErrorVariant::FailedArgumentsParsing, e.to_string()))?;
        if !value.is_object() {
            return Err(type_error(direction, "payload must be a JSON object"));
        }

        fn typed<T: serde::de::DeserializeOwned>(
            direction: Direction,
            value: serde_json::Value,
        ) -> Result<T, ProtocolError> {
            serde_json::from_value(value).map_err(|e| type_error(direction, e.to_string()))
        }

        let payload = match Shape::of(direction, command) {
            Shape::Empty => Payload::Empty,
            Shape::Ping => Payload::Ping(typed(direction, value)?),
            Shape::Start => Payload::Start(typed(direction, value)?),
            Shape::PingReply => Payload::PingReply(typed(direction, value)?),
            Shape::StaticStatus => Payload::StaticStatus(typed(direction, value)?),
            Shape::Status => Payload::Status(typed(direction, value)?),
            Shape::Error => Payload::Error(typed(direction, value)?),
        };
        payload.validate(direction)?;
        Ok(payload)
    }

    pub fn encode(&self, direction: Direction) -> Result<String, ProtocolError> {
        let text = match self {
            Payload::Empty => Ok("{}".to_string()),
            Payload::Ping(a) => to_wire_json(a),
            Payload::Start(a) => to_wire_json(a),
            Payload::PingReply(r) => to_wire_json(r),
            Payload::StaticStatus(r) => to_wire_json(r),
            Payload::Status(r) => to_wire_json(r),
            Payload::Error(r) => to_wire_json(r),
        };
        text.map_err(|e| other_error(direction, e.to_string()))
    }
}

impl Metadata {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let bad = |detail: String| ProtocolError::new(ErrorVariant::FailedMetadataParsing, detail);
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| bad(e.to_string()))?;
        if !value.is_object() {
            return Err(bad("metadata must be a JSON object".into()));
        }
        let meta: Metadata = serde_json::from_value(value).map_err(|e| bad(e.to_string()))?;
        if !(meta.time.is_finite() && meta.time >= 0.0) {
            return Err(ProtocolError::new(
                ErrorVariant::FailedMetadataParsing,
                format!("time must be a non-negative timestamp, got {}", meta.time),
            ));
        }
        Ok(meta)
    }
}
