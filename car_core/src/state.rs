//! Distance state shared by the odometer callback, the control loop and STATUS.
//!
//! One `parking_lot::Mutex` guards the whole record, so a reader always sees
//! counters, distance and stage from the same instant. Acquisitions on the
//! command path are bounded with `try_lock_for`; nothing holds the lock
//! across a motor or sensor call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use car_traits::Polarity;
use parking_lot::{Mutex, MutexGuard};

use crate::stage::{InvalidTransition, Stage};

#[derive(Debug, Clone)]
pub struct DistanceState {
    pub(crate) distance_cm: f64,
    pub(crate) velocity_cm_s: f64,
    /// Every accepted edge, whatever the direction. Reset only by START.
    pub(crate) magnet_hit_counter: u64,
    /// Forward edges minus reverse edges, floored at zero.
    pub(crate) net_edges: u64,
    pub(crate) run_start: Option<Instant>,
    /// Direction the wheel was last driven in; coasting keeps it.
    pub(crate) direction: Polarity,
    pub(crate) stage: Stage,
    pub(crate) last_edge: Option<Instant>,
}

impl Default for DistanceState {
    fn default() -> Self {
        Self {
            distance_cm: 0.0,
            velocity_cm_s: 0.0,
            magnet_hit_counter: 0,
            net_edges: 0,
            run_start: None,
            direction: Polarity::Forward,
            stage: Stage::Idle,
            last_edge: None,
        }
    }
}

impl DistanceState {
    pub fn distance_cm(&self) -> f64 {
        self.distance_cm
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn magnet_hit_counter(&self) -> u64 {
        self.magnet_hit_counter
    }

    pub fn is_running(&self) -> bool {
        self.stage.is_running()
    }

    /// Zero the counters ahead of a new run. Stage is left alone.
    pub(crate) fn reset_counters(&mut self) {
        self.distance_cm = 0.0;
        self.velocity_cm_s = 0.0;
        self.magnet_hit_counter = 0;
        self.net_edges = 0;
        self.last_edge = None;
        self.run_start = None;
        self.direction = Polarity::Forward;
    }

    pub(crate) fn set_stage(&mut self, to: Stage) -> Result<(), InvalidTransition> {
        let next = self.stage.transition(to)?;
        tracing::debug!(from = ?self.stage, to = ?next, "stage");
        self.stage = next;
        Ok(())
    }

    pub(crate) fn runtime(&self, now: Instant) -> Duration {
        self.run_start
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO)
    }

    pub fn snapshot(&self, now: Instant) -> DistanceSnapshot {
        DistanceSnapshot {
            distance_cm: self.distance_cm,
            velocity_cm_s: self.velocity_cm_s,
            magnet_hit_counter: self.magnet_hit_counter,
            stage: self.stage,
            runtime: self.runtime(now),
        }
    }
}

/// Consistent copy of the distance state taken under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSnapshot {
    pub distance_cm: f64,
    pub velocity_cm_s: f64,
    pub magnet_hit_counter: u64,
    pub stage: Stage,
    pub runtime: Duration,
}

impl DistanceSnapshot {
    pub fn running(&self) -> bool {
        self.stage.is_running()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<DistanceState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded acquisition for the command path.
    pub fn lock_within(&self, timeout: Duration) -> Option<MutexGuard<'_, DistanceState>> {
        self.inner.try_lock_for(timeout)
    }

    /// Unbounded acquisition for the edge handler and the control loop,
    /// whose peers only ever hold the lock for field updates.
    pub(crate) fn lock(&self) -> MutexGuard<'_, DistanceState> {
        self.inner.lock()
    }

    pub fn snapshot_within(&self, timeout: Duration, now: Instant) -> Option<DistanceSnapshot> {
        self.lock_within(timeout).map(|st| st.snapshot(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_stage_and_zeroes_counters() {
        let mut st = DistanceState {
            distance_cm: 12.0,
            velocity_cm_s: 3.0,
            magnet_hit_counter: 7,
            net_edges: 5,
            run_start: Some(Instant::now()),
            direction: Polarity::Backward,
            stage: Stage::Stopped,
            last_edge: Some(Instant::now()),
        };
        st.reset_counters();
        assert_eq!(st.distance_cm(), 0.0);
        assert_eq!(st.magnet_hit_counter(), 0);
        assert_eq!(st.net_edges, 0);
        assert!(st.run_start.is_none());
        assert!(st.last_edge.is_none());
        assert_eq!(st.direction, Polarity::Forward);
        assert_eq!(st.stage(), Stage::Stopped);
    }

    #[test]
    fn illegal_stage_change_leaves_stage() {
        let mut st = DistanceState::default();
        assert!(st.set_stage(Stage::CreepingBackward).is_err());
        assert_eq!(st.stage(), Stage::Idle);
        st.set_stage(Stage::DrivingForward).unwrap();
        assert!(st.is_running());
    }

    #[test]
    fn runtime_is_zero_without_run() {
        let st = DistanceState::default();
        assert_eq!(st.runtime(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn lock_within_times_out_while_held() {
        let shared = SharedState::new();
        let _guard = shared.lock();
        let other = shared.clone();
        let got = std::thread::spawn(move || other.lock_within(Duration::from_millis(5)).is_some())
            .join()
            .unwrap();
        assert!(!got);
    }
}
