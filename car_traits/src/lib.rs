pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Direction a relay pair drives the motor in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Forward,
    Backward,
}

impl Polarity {
    /// The pair that must be released before this one may be engaged.
    pub fn opposite(self) -> Self {
        match self {
            Polarity::Forward => Polarity::Backward,
            Polarity::Backward => Polarity::Forward,
        }
    }
}

/// Raw access to the two relay pairs of an H-bridge built from relays.
///
/// `engaged = true` means the pair conducts (logical HIGH); implementations
/// take care of any active-low wiring.
pub trait RelayBank {
    fn set_pair(
        &mut self,
        polarity: Polarity,
        engaged: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Release both pairs at once.
    fn release_all(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.set_pair(Polarity::Forward, false)?;
        self.set_pair(Polarity::Backward, false)
    }
}

/// DC motor with polarity switching.
pub trait Motor {
    fn drive_forward(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn drive_backward(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn cut_power(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Invoked once per detected magnet edge, from the sensor's own thread.
pub type EdgeCallback = Box<dyn FnMut() + Send + 'static>;

/// Hall-effect sensor counting magnets passing on the wheel.
pub trait MagnetSensor {
    /// Arm the sensor. Replaces any callback registered earlier.
    fn register_edge_callback(
        &mut self,
        callback: EdgeCallback,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn clear_edge_callback(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Line-oriented byte stream to the operator console.
pub trait Transport {
    /// Blocks until a full line is available. `None` once the peer is gone.
    /// The returned line has its terminator stripped.
    fn read_line(&mut self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    /// Writes `line` followed by a single `\n`.
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
