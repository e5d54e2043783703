#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the vehicle controller.
//!
//! `Config` and its sections are deserialized from TOML, then checked by
//! [`Config::validate`] before anything touches the hardware.
use serde::Deserialize;

/// Highest BCM GPIO number exposed on the 40-pin header.
pub const MAX_BCM_PIN: u8 = 27;

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Vehicle {
    pub number_of_magnets: u32,
    /// Wheel diameter in centimetres
    pub wheel_diameter_cm: f64,
}

/// BCM pin numbers. The forward and backward pairs each have a positive and
/// a negative relay.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub forward_pos: u8,
    pub forward_neg: u8,
    pub backward_pos: u8,
    pub backward_neg: u8,
    pub magnet: u8,
    /// Relays energize when the pin is driven low
    #[serde(default = "default_true")]
    pub relay_active_low: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Serial {
    /// Serial device; stdin/stdout when absent
    pub device: Option<String>,
    pub baud_rate: u32,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: 115_200,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Motion {
    /// Control loop polling period
    pub poll_ms: u64,
    /// Dead time between releasing one relay pair and engaging the other
    pub interlock_ms: u64,
    /// Quiet window (no magnet edges) that marks the end of coasting
    pub coast_settle_ms: u64,
    pub creep_pulse_ms: u64,
    pub creep_settle_ms: u64,
    pub max_creep_attempts: u32,
    /// Cut power this far before the target
    pub forward_leeway_cm: f64,
    /// Accepted overshoot after creeping back; half an edge spacing when absent
    pub backward_tolerance_cm: Option<f64>,
    pub stop_ack_timeout_ms: u64,
    pub lock_timeout_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            interlock_ms: 100,
            coast_settle_ms: 3000,
            creep_pulse_ms: 100,
            creep_settle_ms: 1000,
            max_creep_attempts: 8,
            forward_leeway_cm: 0.0,
            backward_tolerance_cm: None,
            stop_ack_timeout_ms: 1000,
            lock_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Odometer {
    /// Edges closer than this to the previous one are treated as bounce (0 disables)
    pub debounce_ms: u64,
}

impl Default for Odometer {
    fn default() -> Self {
        Self { debounce_ms: 10 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Protocol {
    /// Answer PING with an error when the console clock is ahead of ours
    pub reject_negative_latency: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub vehicle: Vehicle,
    pub pins: Pins,
    #[serde(default)]
    pub serial: Serial,
    #[serde(default)]
    pub motion: Motion,
    #[serde(default)]
    pub odometer: Odometer,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Vehicle
        if self.vehicle.number_of_magnets == 0 {
            eyre::bail!("vehicle.number_of_magnets must be >= 1");
        }
        let d = self.vehicle.wheel_diameter_cm;
        if !(d.is_finite() && d > 0.0) {
            eyre::bail!("vehicle.wheel_diameter_cm must be > 0");
        }

        // Pins
        let pins = [
            ("forward_pos", self.pins.forward_pos),
            ("forward_neg", self.pins.forward_neg),
            ("backward_pos", self.pins.backward_pos),
            ("backward_neg", self.pins.backward_neg),
            ("magnet", self.pins.magnet),
        ];
        for (i, (name, pin)) in pins.iter().enumerate() {
            if *pin > MAX_BCM_PIN {
                eyre::bail!("pins.{name} must be a BCM pin in 0..={MAX_BCM_PIN}");
            }
            if let Some((other, _)) = pins[..i].iter().find(|(_, p)| p == pin) {
                eyre::bail!("pins.{name} duplicates pins.{other} (pin {pin})");
            }
        }

        // Serial
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }
        if let Some(dev) = &self.serial.device
            && dev.trim().is_empty()
        {
            eyre::bail!("serial.device must not be empty when set");
        }

        // Motion
        let m = &self.motion;
        if m.poll_ms == 0 {
            eyre::bail!("motion.poll_ms must be >= 1");
        }
        if m.poll_ms > 1000 {
            eyre::bail!("motion.poll_ms is unreasonably large (>1s)");
        }
        if m.interlock_ms > 5000 {
            eyre::bail!("motion.interlock_ms is unreasonably large (>5s)");
        }
        if m.creep_pulse_ms == 0 {
            eyre::bail!("motion.creep_pulse_ms must be >= 1");
        }
        if !(m.forward_leeway_cm.is_finite() && m.forward_leeway_cm >= 0.0) {
            eyre::bail!("motion.forward_leeway_cm must be >= 0");
        }
        if let Some(tol) = m.backward_tolerance_cm
            && !(tol.is_finite() && tol >= 0.0)
        {
            eyre::bail!("motion.backward_tolerance_cm must be >= 0");
        }
        if m.stop_ack_timeout_ms == 0 {
            eyre::bail!("motion.stop_ack_timeout_ms must be >= 1");
        }
        if m.lock_timeout_ms == 0 {
            eyre::bail!("motion.lock_timeout_ms must be >= 1");
        }
        // The loop must be able to notice cancellation well within the STOP bound
        if m.poll_ms >= m.stop_ack_timeout_ms {
            eyre::bail!("motion.poll_ms must be < motion.stop_ack_timeout_ms");
        }

        // Odometer
        if self.odometer.debounce_ms > 1000 {
            eyre::bail!("odometer.debounce_ms is unreasonably large (>1s)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
