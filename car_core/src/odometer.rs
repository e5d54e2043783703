//! Magnet-pulse odometer: turns hall-sensor edges into distance and velocity.
//!
//! Each edge is one `1/m` of a wheel turn, i.e. `π·d/m` centimetres. Edges
//! while the wheel was last driven backward count against the distance.

use std::time::{Duration, Instant};

use car_traits::Polarity;

use crate::config::{OdometerCfg, VehicleCfg};
use crate::state::{DistanceState, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Counted,
    /// Too close to the previous edge.
    Debounced,
    /// No run active.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
pub struct Odometer {
    vehicle: VehicleCfg,
    debounce: Duration,
}

impl Odometer {
    pub fn new(vehicle: VehicleCfg, cfg: OdometerCfg) -> Self {
        Self {
            vehicle,
            debounce: cfg.debounce,
        }
    }

    #[inline]
    pub fn cm_per_edge(&self) -> f64 {
        self.vehicle.cm_per_edge()
    }

    /// Distance for a net number of edges.
    #[inline]
    pub fn distance_for(&self, net_edges: u64) -> f64 {
        net_edges as f64 * self.cm_per_edge()
    }

    /// Apply one sensor edge observed at `now`. Caller holds the lock.
    pub fn record_edge(&self, st: &mut DistanceState, now: Instant) -> EdgeOutcome {
        let Some(start) = st.run_start else {
            return EdgeOutcome::Ignored;
        };
        if let Some(prev) = st.last_edge
            && !self.debounce.is_zero()
            && now.saturating_duration_since(prev) < self.debounce
        {
            return EdgeOutcome::Debounced;
        }

        st.last_edge = Some(now);
        st.magnet_hit_counter += 1;
        st.net_edges = match st.direction {
            Polarity::Forward => st.net_edges + 1,
            Polarity::Backward => st.net_edges.saturating_sub(1),
        };
        st.distance_cm = self.distance_for(st.net_edges);

        let runtime = now.saturating_duration_since(start).as_secs_f64();
        st.velocity_cm_s = if runtime > 0.0 {
            st.distance_cm / runtime
        } else {
            0.0
        };
        tracing::trace!(
            hits = st.magnet_hit_counter,
            distance_cm = st.distance_cm,
            direction = ?st.direction,
            "magnet edge"
        );
        EdgeOutcome::Counted
    }

    /// Edge handler suitable for `MagnetSensor::register_edge_callback`.
    pub fn edge_handler<C>(self, state: SharedState, clock: C) -> impl FnMut() + Send + 'static
    where
        C: car_traits::Clock + Send + 'static,
    {
        move || {
            let now = clock.now();
            let mut st = state.lock();
            if self.record_edge(&mut st, now) == EdgeOutcome::Debounced {
                tracing::trace!("edge debounced");
            }
        }
    }
}
