//! Command dispatch: one request frame in, one response frame out.
//!
//! Handlers are looked up in [`Dispatcher::route`]; every failure becomes an
//! `ERROR` response carrying its taxonomy code, so the serve loop never has
//! to look inside a reply.

use std::time::Instant;

use car_traits::{MagnetSensor, Motor};

use crate::config::{ProtocolCfg, RunConfig};
use crate::controller::MotionController;
use crate::error::{ErrorVariant, ProtocolError};
use crate::protocol::messages::Shape;
use crate::protocol::{
    Command, Direction, DistanceInfo, Frame, Payload, PingResponse, StaticStatusResponse,
    StatusResponse, decode, encode,
};
use crate::util::{unix_now, whole_secs};

/// Last-resort reply if even an ERROR frame cannot be encoded.
const FALLBACK_REPLY: &str =
    r#"~ERROR${"error_variant": 11, "message": "Malformed response - Other error"}${"time": 0.0}"#;

type Handler<M, S> = fn(&mut Dispatcher<M, S>, &Frame) -> Result<Payload, ProtocolError>;

pub struct Dispatcher<M, S>
where
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    controller: MotionController<M, S>,
    protocol: ProtocolCfg,
    booted: Instant,
    wall_clock: fn() -> f64,
}

impl<M, S> Dispatcher<M, S>
where
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    pub fn new(controller: MotionController<M, S>, protocol: ProtocolCfg) -> Self {
        Self {
            controller,
            protocol,
            booted: Instant::now(),
            wall_clock: unix_now,
        }
    }

    /// Replace the unix-time source used for metadata and ping latency.
    pub fn with_wall_clock(mut self, wall_clock: fn() -> f64) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    fn now(&self) -> f64 {
        (self.wall_clock)()
    }

    fn route(command: Command) -> Option<Handler<M, S>> {
        match command {
            Command::Ping => Some(Self::ping),
            Command::Start => Some(Self::start),
            Command::Stop => Some(Self::stop),
            Command::StaticStatus => Some(Self::static_status),
            Command::Status => Some(Self::status),
            Command::Error => None,
        }
    }

    pub fn dispatch(&mut self, frame: Frame) -> Frame {
        let command = frame.command;
        match self.handle(&frame) {
            Ok(payload) => Frame::response(command, payload, self.now()),
            Err(e) => {
                tracing::warn!(
                    command = command.token(),
                    code = e.code(),
                    error = %e,
                    "request failed"
                );
                Frame::error(&e, self.now())
            }
        }
    }

    fn handle(&mut self, frame: &Frame) -> Result<Payload, ProtocolError> {
        if frame.direction == Direction::Response {
            return Err(ProtocolError::new(
                ErrorVariant::RequestOtherError,
                format!("response frame {} sent to the vehicle", frame.command.token()),
            ));
        }
        let expected = Shape::of(Direction::Request, frame.command);
        if frame.payload.shape() != expected {
            return Err(ProtocolError::new(
                ErrorVariant::RequestTypeError,
                format!("{} expects a {expected:?} payload", frame.command.token()),
            ));
        }
        frame.payload.validate(Direction::Request)?;

        let handler = Self::route(frame.command).ok_or_else(|| {
            ProtocolError::new(
                ErrorVariant::AnyOther,
                format!("no handler for {}", frame.command.token()),
            )
        })?;
        handler(self, frame)
    }

    /// Decode, dispatch and encode one line. Always yields a reply.
    pub fn handle_line(&mut self, line: &str) -> String {
        let reply = match decode(line) {
            Ok(frame) => {
                tracing::debug!(command = frame.command.token(), "request");
                self.dispatch(frame)
            }
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "undecodable request");
                Frame::error(&e, self.now())
            }
        };
        match encode(&reply) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(code = e.code(), error = %e, "response encoding failed");
                encode(&Frame::error(&e, self.now())).unwrap_or_else(|_| FALLBACK_REPLY.to_string())
            }
        }
    }

    // ── Handlers ──────────────────────────────────────────────────────────

    fn ping(&mut self, frame: &Frame) -> Result<Payload, ProtocolError> {
        let Payload::Ping(args) = &frame.payload else {
            return Err(ProtocolError::new(ErrorVariant::RequestTypeError, "PING"));
        };
        let latency_s = self.now() - frame.metadata.time;
        if latency_s < 0.0 {
            if self.protocol.reject_negative_latency {
                return Err(ProtocolError::new(
                    ErrorVariant::PingNegativeLatency,
                    format!("request is {:.3}s in the future", -latency_s),
                ));
            }
            tracing::warn!(latency_s, "ping from the future, clocks disagree");
        } else {
            tracing::info!(latency_s, "ping");
        }
        Ok(Payload::PingReply(PingResponse {
            sent_time: args.time,
        }))
    }

    fn start(&mut self, frame: &Frame) -> Result<Payload, ProtocolError> {
        let Payload::Start(args) = &frame.payload else {
            return Err(ProtocolError::new(ErrorVariant::RequestTypeError, "START"));
        };
        self.controller.start(RunConfig {
            target_cm: args.distance,
            reverse_brake: args.reverse_brake,
        })?;
        Ok(Payload::Empty)
    }

    fn stop(&mut self, _frame: &Frame) -> Result<Payload, ProtocolError> {
        self.controller.stop()?;
        Ok(Payload::Empty)
    }

    fn static_status(&mut self, _frame: &Frame) -> Result<Payload, ProtocolError> {
        let v = self.controller.vehicle();
        Ok(Payload::StaticStatus(StaticStatusResponse {
            number_of_magnets: v.number_of_magnets,
            wheel_diameter: v.wheel_diameter_cm,
        }))
    }

    fn status(&mut self, _frame: &Frame) -> Result<Payload, ProtocolError> {
        let snap = self.controller.status()?;
        Ok(Payload::Status(StatusResponse {
            running: snap.running(),
            uptime: whole_secs(self.booted.elapsed()),
            runtime: whole_secs(snap.runtime),
            distance: DistanceInfo {
                distance: snap.distance_cm,
                velocity: snap.velocity_cm_s,
                magnet_hit_counter: snap.magnet_hit_counter,
            },
            stage: snap.stage.code(),
        }))
    }
}
