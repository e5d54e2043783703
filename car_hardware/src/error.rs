use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("uart error: {0}")]
    Uart(String),
    #[error("relay on pin {pin} did not latch (expected {expected})")]
    RelayMismatch { pin: u8, expected: &'static str },
    #[error("both relay pairs engaged")]
    ShootThrough,
    #[error("sensor thread unavailable")]
    SensorThread,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
