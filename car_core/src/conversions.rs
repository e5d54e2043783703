//! `From` implementations bridging `car_config` types to `car_core` types.

use std::time::Duration;

use crate::config::{ControllerCfg, MotionCfg, OdometerCfg, ProtocolCfg, VehicleCfg};

// ── VehicleCfg ───────────────────────────────────────────────────────────────

impl From<&car_config::Vehicle> for VehicleCfg {
    fn from(c: &car_config::Vehicle) -> Self {
        Self {
            number_of_magnets: c.number_of_magnets,
            wheel_diameter_cm: c.wheel_diameter_cm,
        }
    }
}

// ── MotionCfg ────────────────────────────────────────────────────────────────

impl From<&car_config::Motion> for MotionCfg {
    fn from(c: &car_config::Motion) -> Self {
        Self {
            poll: Duration::from_millis(c.poll_ms),
            interlock: Duration::from_millis(c.interlock_ms),
            coast_settle: Duration::from_millis(c.coast_settle_ms),
            creep_pulse: Duration::from_millis(c.creep_pulse_ms),
            creep_settle: Duration::from_millis(c.creep_settle_ms),
            max_creep_attempts: c.max_creep_attempts,
            forward_leeway_cm: c.forward_leeway_cm,
            backward_tolerance_cm: c.backward_tolerance_cm,
            stop_ack_timeout: Duration::from_millis(c.stop_ack_timeout_ms),
            lock_timeout: Duration::from_millis(c.lock_timeout_ms),
        }
    }
}

// ── OdometerCfg ──────────────────────────────────────────────────────────────

impl From<&car_config::Odometer> for OdometerCfg {
    fn from(c: &car_config::Odometer) -> Self {
        Self {
            debounce: Duration::from_millis(c.debounce_ms),
        }
    }
}

// ── ProtocolCfg ──────────────────────────────────────────────────────────────

impl From<&car_config::Protocol> for ProtocolCfg {
    fn from(c: &car_config::Protocol) -> Self {
        Self {
            reject_negative_latency: c.reject_negative_latency,
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&car_config::Config> for ControllerCfg {
    fn from(c: &car_config::Config) -> Self {
        Self {
            vehicle: (&c.vehicle).into(),
            motion: (&c.motion).into(),
            odometer: (&c.odometer).into(),
        }
    }
}
