//! Frame codec: `<prefix><COMMAND>$<payload>$<metadata>`.
//!
//! Decoding checks, in order: prefix, command, separator count, payload,
//! metadata. The first rule that fails decides the error code.

use crate::error::{ErrorVariant, ProtocolError};

use super::messages::{ErrorResponse, Metadata, Payload, Shape};

pub const SEPARATOR: char = '$';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `?`, console to vehicle
    Request,
    /// `~`, vehicle to console
    Response,
}

impl Direction {
    pub fn prefix(self) -> char {
        match self {
            Direction::Request => '?',
            Direction::Response => '~',
        }
    }

    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '?' => Some(Direction::Request),
            '~' => Some(Direction::Response),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Start,
    Stop,
    StaticStatus,
    Status,
    /// Only meaningful as a response; `UNKNOWN` is accepted as an alias.
    Error,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Ping,
        Command::Start,
        Command::Stop,
        Command::StaticStatus,
        Command::Status,
        Command::Error,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Start => "START",
            Command::Stop => "STOP",
            Command::StaticStatus => "STATIC_STATUS",
            Command::Status => "STATUS",
            Command::Error => "ERROR",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "PING" => Some(Command::Ping),
            "START" => Some(Command::Start),
            "STOP" => Some(Command::Stop),
            "STATIC_STATUS" | "STATICSTATUS" => Some(Command::StaticStatus),
            "STATUS" => Some(Command::Status),
            "ERROR" | "UNKNOWN" => Some(Command::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub direction: Direction,
    pub command: Command,
    pub payload: Payload,
    pub metadata: Metadata,
}

impl Frame {
    pub fn request(command: Command, payload: Payload, time: f64) -> Self {
        Self {
            direction: Direction::Request,
            command,
            payload,
            metadata: Metadata { time },
        }
    }

    pub fn response(command: Command, payload: Payload, time: f64) -> Self {
        Self {
            direction: Direction::Response,
            command,
            payload,
            metadata: Metadata { time },
        }
    }

    pub fn error(err: &ProtocolError, time: f64) -> Self {
        Self::response(Command::Error, Payload::Error(ErrorResponse::from(err)), time)
    }
}

fn strip_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .or_else(|| line.strip_suffix('\r'))
        .unwrap_or(line)
}

pub fn decode(line: &str) -> Result<Frame, ProtocolError> {
    let line = strip_terminator(line);

    // 1. prefix
    let mut chars = line.chars();
    let direction = match chars.next() {
        None => {
            return Err(ProtocolError::new(
                ErrorVariant::FailedPrefixParsing,
                "empty line",
            ));
        }
        Some(c) => Direction::from_prefix(c).ok_or_else(|| {
            ProtocolError::new(
                ErrorVariant::FailedPrefixParsing,
                format!("unknown prefix {c:?}"),
            )
        })?,
    };
    let rest = chars.as_str();

    // 2. command
    let (token, tail) = match rest.split_once(SEPARATOR) {
        Some((token, tail)) => (token, Some(tail)),
        None => (rest, None),
    };
    let command = Command::from_token(token).ok_or_else(|| {
        ProtocolError::new(
            ErrorVariant::FailedCommandParsing,
            format!("unknown command {token:?}"),
        )
    })?;

    // 3. separators
    let segments: Vec<&str> = tail.map(|t| t.split(SEPARATOR).collect()).unwrap_or_default();
    let [payload_text, metadata_text] = segments.as_slice() else {
        return Err(ProtocolError::new(
            ErrorVariant::FailedSeparatorParsing,
            format!("expected 2 segments after the command, found {}", segments.len()),
        ));
    };

    // 4. payload, 5. metadata
    let payload = Payload::decode(direction, command, payload_text)?;
    let metadata = Metadata::decode(metadata_text)?;

    // 6. a terminator left inside an otherwise well-formed frame
    if line.contains(['\n', '\r']) {
        return Err(ProtocolError::new(
            ErrorVariant::RequestOtherError,
            "line terminator inside frame",
        ));
    }

    Ok(Frame {
        direction,
        command,
        payload,
        metadata,
    })
}

/// Frame text without the trailing newline; transports append it.
pub fn encode(frame: &Frame) -> Result<String, ProtocolError> {
    let direction = frame.direction;
    let expected = Shape::of(direction, frame.command);
    if frame.payload.shape() != expected {
        let variant = match direction {
            Direction::Request => ErrorVariant::RequestTypeError,
            Direction::Response => ErrorVariant::ResponseTypeError,
        };
        return Err(ProtocolError::new(
            variant,
            format!(
                "{} expects a {expected:?} payload, got {:?}",
                frame.command.token(),
                frame.payload.shape()
            ),
        ));
    }
    frame.payload.validate(direction)?;
    if !(frame.metadata.time.is_finite() && frame.metadata.time >= 0.0) {
        return Err(ProtocolError::new(
            ErrorVariant::FailedMetadataParsing,
            "metadata time must be a non-negative timestamp",
        ));
    }

    let payload = frame.payload.encode(direction)?;
    let metadata = super::json::to_wire_json(&frame.metadata).map_err(|e| {
        ProtocolError::new(ErrorVariant::FailedMetadataParsing, e.to_string())
    })?;
    Ok(format!(
        "{}{}{SEPARATOR}{payload}{SEPARATOR}{metadata}",
        direction.prefix(),
        frame.command.token()
    ))
}
