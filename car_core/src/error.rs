use std::time::Duration;

use thiserror::Error;

/// Numeric error taxonomy shared with the operator console.
///
/// The discriminant is the `error_variant` carried by `ERROR` responses.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorVariant {
    FailedPrefixParsing = 0,
    FailedCommandParsing = 1,
    FailedSeparatorParsing = 2,
    FailedArgumentsParsing = 3,
    FailedMetadataParsing = 4,
    RequestTypeError = 5,
    RequestOtherError = 6,
    ResponseTypeError = 10,
    ResponseOtherError = 11,
    StartAlreadyStarted = 21,
    StartOdometerFailed = 22,
    StartMotorFailed = 23,
    StartLockUnavailable = 24,
    StopNotStarted = 25,
    StopLoopUnresponsive = 26,
    StatusLockUnavailable = 27,
    PingNegativeLatency = 28,
    AnyOther = 99,
}

impl ErrorVariant {
    pub const ALL: [ErrorVariant; 18] = [
        Self::FailedPrefixParsing,
        Self::FailedCommandParsing,
        Self::FailedSeparatorParsing,
        Self::FailedArgumentsParsing,
        Self::FailedMetadataParsing,
        Self::RequestTypeError,
        Self::RequestOtherError,
        Self::ResponseTypeError,
        Self::ResponseOtherError,
        Self::StartAlreadyStarted,
        Self::StartOdometerFailed,
        Self::StartMotorFailed,
        Self::StartLockUnavailable,
        Self::StopNotStarted,
        Self::StopLoopUnresponsive,
        Self::StatusLockUnavailable,
        Self::PingNegativeLatency,
        Self::AnyOther,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.code() == code)
    }

    /// Text the console shows for this code.
    pub fn description(self) -> &'static str {
        match self {
            Self::FailedPrefixParsing => "Malformed request - Failed prefix parsing",
            Self::FailedCommandParsing => "Malformed request - Failed command parsing",
            Self::FailedSeparatorParsing => "Malformed request - Failed separator parsing",
            Self::FailedArgumentsParsing => "Malformed request - Failed arguments parsing",
            Self::FailedMetadataParsing => "Malformed request - Failed metadata parsing",
            Self::RequestTypeError => "Malformed request - Type error",
            Self::RequestOtherError => "Malformed request - Other error",
            Self::ResponseTypeError => "Malformed response - Type error",
            Self::ResponseOtherError => "Malformed response - Other error",
            Self::StartAlreadyStarted => "Failed to start - Already started",
            Self::StartOdometerFailed => "Failed to start - Magnet odometer failed",
            Self::StartMotorFailed => "Failed to start - Motor control failed",
            Self::StartLockUnavailable => "Failed to start - Could not acquire distance mutex lock",
            Self::StopNotStarted => "Failed to stop - Not started",
            Self::StopLoopUnresponsive => "Failed to stop - Start thread would not respond",
            Self::StatusLockUnavailable => "Failed status - Could not acquire distance mutex lock",
            Self::PingNegativeLatency => "Failed ping - Negative latency",
            Self::AnyOther => "Any other error",
        }
    }
}

/// A fault that ends up on the wire as an `ERROR` response.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}: {detail}", .variant.description())]
pub struct ProtocolError {
    pub variant: ErrorVariant,
    pub detail: String,
}

impl ProtocolError {
    pub fn new(variant: ErrorVariant, detail: impl Into<String>) -> Self {
        Self {
            variant,
            detail: detail.into(),
        }
    }

    #[inline]
    pub fn code(&self) -> u8 {
        self.variant.code()
    }
}

/// Hardware failure reported through a capability trait.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwFault {
    #[error("relay interlock violated: {0}")]
    Interlock(String),
    #[error("hardware fault: {0}")]
    Fault(String),
    #[error("hardware error: {0}")]
    Other(String),
}

/// Failures of the motion controller operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("a run is already active")]
    AlreadyStarted,
    #[error("odometer could not be armed: {0}")]
    Odometer(HwFault),
    #[error("motor command failed: {0}")]
    Motor(HwFault),
    #[error("distance state lock not acquired within {0:?}")]
    StartLock(Duration),
    #[error("no run is active")]
    NotStarted,
    #[error("control loop did not acknowledge within {0:?}")]
    LoopUnresponsive(Duration),
    #[error("distance state lock not acquired within {0:?}")]
    StatusLock(Duration),
}

impl ControlError {
    pub fn variant(&self) -> ErrorVariant {
        match self {
            ControlError::AlreadyStarted => ErrorVariant::StartAlreadyStarted,
            ControlError::Odometer(_) => ErrorVariant::StartOdometerFailed,
            ControlError::Motor(_) => ErrorVariant::StartMotorFailed,
            ControlError::StartLock(_) => ErrorVariant::StartLockUnavailable,
            ControlError::NotStarted => ErrorVariant::StopNotStarted,
            ControlError::LoopUnresponsive(_) => ErrorVariant::StopLoopUnresponsive,
            ControlError::StatusLock(_) => ErrorVariant::StatusLockUnavailable,
        }
    }
}

impl From<ControlError> for ProtocolError {
    fn from(e: ControlError) -> Self {
        ProtocolError::new(e.variant(), e.to_string())
    }
}
