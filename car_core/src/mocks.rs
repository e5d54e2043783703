//! Test doubles for the capability traits.
//!
//! Both are cheap handles around shared state, so a test can keep a clone
//! while the controller owns the other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use car_traits::{EdgeCallback, MagnetSensor, Motor};
use parking_lot::Mutex;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorEvent {
    Forward,
    Backward,
    Cut,
}

#[derive(Default)]
struct MotorLog {
    events: Vec<(Instant, MotorEvent)>,
    fail_forward: bool,
    backward_stall: Duration,
}

/// Motor that records every command with its timestamp.
#[derive(Clone, Default)]
pub struct RecordingMotor {
    log: Arc<Mutex<MotorLog>>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next forward commands fail.
    pub fn fail_forward(&self, fail: bool) {
        self.log.lock().fail_forward = fail;
    }

    /// Block every backward command for `d` before it takes effect.
    pub fn stall_backward(&self, d: Duration) {
        self.log.lock().backward_stall = d;
    }

    pub fn events(&self) -> Vec<MotorEvent> {
        self.log.lock().events.iter().map(|(_, e)| *e).collect()
    }

    pub fn timed_events(&self) -> Vec<(Instant, MotorEvent)> {
        self.log.lock().events.clone()
    }

    fn push(&self, e: MotorEvent) {
        self.log.lock().events.push((Instant::now(), e));
    }
}

impl Motor for RecordingMotor {
    fn drive_forward(&mut self) -> Result<(), BoxError> {
        if self.log.lock().fail_forward {
            return Err(Box::new(std::io::Error::other("forward relay stuck")));
        }
        self.push(MotorEvent::Forward);
        Ok(())
    }

    fn drive_backward(&mut self) -> Result<(), BoxError> {
        let stall = self.log.lock().backward_stall;
        if !stall.is_zero() {
            std::thread::sleep(stall);
        }
        self.push(MotorEvent::Backward);
        Ok(())
    }

    fn cut_power(&mut self) -> Result<(), BoxError> {
        self.push(MotorEvent::Cut);
        Ok(())
    }
}

#[derive(Default)]
struct SensorSlot {
    callback: Option<EdgeCallback>,
    fail_register: bool,
}

/// Magnet sensor whose edges are fired by hand.
#[derive(Clone, Default)]
pub struct ManualSensor {
    slot: Arc<Mutex<SensorSlot>>,
}

impl ManualSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_register(&self, fail: bool) {
        self.slot.lock().fail_register = fail;
    }

    pub fn armed(&self) -> bool {
        self.slot.lock().callback.is_some()
    }

    /// Deliver `n` edges. Returns false if no callback is registered.
    pub fn fire(&self, n: usize) -> bool {
        let mut slot = self.slot.lock();
        let Some(cb) = slot.callback.as_mut() else {
            return false;
        };
        for _ in 0..n {
            cb();
        }
        true
    }
}

impl MagnetSensor for ManualSensor {
    fn register_edge_callback(&mut self, callback: EdgeCallback) -> Result<(), BoxError> {
        let mut slot = self.slot.lock();
        if slot.fail_register {
            return Err(Box::new(std::io::Error::other("interrupt unavailable")));
        }
        slot.callback = Some(callback);
        Ok(())
    }

    fn clear_edge_callback(&mut self) -> Result<(), BoxError> {
        self.slot.lock().callback = None;
        Ok(())
    }
}
