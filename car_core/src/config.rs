//! Runtime configuration types for the controller.
//!
//! Separate from the TOML schema in `car_config`; see `conversions` for the
//! mapping between the two.

use std::f64::consts::PI;
use std::time::Duration;

/// Static vehicle geometry, reported by STATIC_STATUS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleCfg {
    pub number_of_magnets: u32,
    /// Wheel diameter in cm.
    pub wheel_diameter_cm: f64,
}

impl VehicleCfg {
    /// Distance rolled between two consecutive magnet edges.
    #[inline]
    pub fn cm_per_edge(&self) -> f64 {
        PI * self.wheel_diameter_cm / f64::from(self.number_of_magnets.max(1))
    }
}

impl Default for VehicleCfg {
    fn default() -> Self {
        // 2.5 in wheel with two magnets
        Self {
            number_of_magnets: 2,
            wheel_diameter_cm: 6.35,
        }
    }
}

/// Timing and tolerances of the control loop.
#[derive(Debug, Clone)]
pub struct MotionCfg {
    pub poll: Duration,
    /// Dead time between releasing one relay pair and engaging the other.
    pub interlock: Duration,
    /// Minimum wait after the cut, and the edge-free window that marks standstill.
    pub coast_settle: Duration,
    pub creep_pulse: Duration,
    pub creep_settle: Duration,
    pub max_creep_attempts: u32,
    pub forward_leeway_cm: f64,
    /// `None` means half of [`VehicleCfg::cm_per_edge`].
    pub backward_tolerance_cm: Option<f64>,
    pub stop_ack_timeout: Duration,
    pub lock_timeout: Duration,
}

impl MotionCfg {
    pub fn backward_tolerance(&self, vehicle: &VehicleCfg) -> f64 {
        self.backward_tolerance_cm
            .unwrap_or_else(|| vehicle.cm_per_edge() / 2.0)
    }
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(10),
            interlock: Duration::from_millis(100),
            coast_settle: Duration::from_millis(3000),
            creep_pulse: Duration::from_millis(100),
            creep_settle: Duration::from_millis(1000),
            max_creep_attempts: 8,
            forward_leeway_cm: 0.0,
            backward_tolerance_cm: None,
            stop_ack_timeout: Duration::from_millis(1000),
            lock_timeout: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OdometerCfg {
    /// Edges closer than this to the previous accepted one are dropped.
    pub debounce: Duration,
}

impl Default for OdometerCfg {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolCfg {
    pub reject_negative_latency: bool,
}

/// Everything the motion controller needs at construction.
#[derive(Debug, Clone, Default)]
pub struct ControllerCfg {
    pub vehicle: VehicleCfg,
    pub motion: MotionCfg,
    pub odometer: OdometerCfg,
}

/// Parameters of one run, captured at START.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunConfig {
    /// Target distance in cm.
    pub target_cm: f64,
    /// Creep back after coasting past the target.
    pub reverse_brake: bool,
}
