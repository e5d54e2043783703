//! Motion controller: the run/stop state machine and its background loop.
//!
//! START arms the odometer, drives forward and hands the run to a loop
//! thread that polls the distance state. The loop cuts power at the target,
//! optionally waits for the coast to die out and creeps backward in short
//! pulses until the overshoot is within tolerance. STOP cancels the loop
//! through a channel, cuts power at once and waits a bounded time for the
//! loop to acknowledge.
//!
//! Threads: the command path (this struct), the loop thread, and whatever
//! thread the sensor invokes the edge callback on. The distance lock is only
//! held for field updates; the motor has its own mutex.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use car_traits::{MagnetSensor, MonotonicClock, Motor, Polarity};
use crossbeam_channel as xch;
use parking_lot::Mutex;

use crate::config::{ControllerCfg, MotionCfg, RunConfig, VehicleCfg};
use crate::error::ControlError;
use crate::hw_error::map_hw_error;
use crate::odometer::Odometer;
use crate::stage::Stage;
use crate::state::{DistanceSnapshot, SharedState};

struct ActiveRun {
    config: RunConfig,
    cancel: xch::Sender<()>,
    done: xch::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

pub struct MotionController<M, S>
where
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    motor: Arc<Mutex<M>>,
    sensor: S,
    state: SharedState,
    odometer: Odometer,
    cfg: ControllerCfg,
    run: Option<ActiveRun>,
}

impl<M, S> MotionController<M, S>
where
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    pub fn new(motor: M, sensor: S, cfg: ControllerCfg) -> Self {
        Self {
            motor: Arc::new(Mutex::new(motor)),
            sensor,
            state: SharedState::new(),
            odometer: Odometer::new(cfg.vehicle, cfg.odometer),
            cfg,
            run: None,
        }
    }

    pub fn vehicle(&self) -> &VehicleCfg {
        &self.cfg.vehicle
    }

    pub fn shared_state(&self) -> SharedState {
        self.state.clone()
    }

    /// Handle that cuts motor power from any thread (signal handlers).
    pub fn power_cutter(&self) -> PowerCutter<M> {
        PowerCutter {
            motor: self.motor.clone(),
        }
    }

    /// Configuration of the run currently owned by the controller, if any.
    pub fn current_run(&self) -> Option<RunConfig> {
        self.run.as_ref().map(|r| r.config)
    }

    pub fn start(&mut self, config: RunConfig) -> Result<(), ControlError> {
        let lock_timeout = self.cfg.motion.lock_timeout;
        // A finished loop marks the run Stopped before exiting; only then may it be reaped
        let running = self
            .state
            .lock_within(lock_timeout)
            .ok_or(ControlError::StartLock(lock_timeout))?
            .is_running();
        if running {
            return Err(ControlError::AlreadyStarted);
        }
        self.reap();

        {
            let mut st = self
                .state
                .lock_within(lock_timeout)
                .ok_or(ControlError::StartLock(lock_timeout))?;
            if st.is_running() {
                return Err(ControlError::AlreadyStarted);
            }
            st.reset_counters();
        }

        let handler = self
            .odometer
            .edge_handler(self.state.clone(), MonotonicClock::new());
        self.sensor
            .register_edge_callback(Box::new(handler))
            .map_err(|e| ControlError::Odometer(map_hw_error(&*e)))?;

        // The motor guard must be gone before abandon_start locks it again
        let forward = self.motor.lock().drive_forward();
        if let Err(e) = forward {
            let fault = map_hw_error(&*e);
            tracing::error!(error = %fault, "forward drive failed");
            self.abandon_start();
            return Err(ControlError::Motor(fault));
        }

        let marked = self.mark_driving(lock_timeout);
        if let Err(e) = marked {
            self.abandon_start();
            return Err(e);
        }

        let (cancel_tx, cancel_rx) = xch::bounded(1);
        let (done_tx, done_rx) = xch::bounded(1);
        let ctx = LoopCtx {
            motor: self.motor.clone(),
            state: self.state.clone(),
            run: config,
            motion: self.cfg.motion.clone(),
            tolerance_cm: self.cfg.motion.backward_tolerance(&self.cfg.vehicle),
            cancel: cancel_rx,
        };
        let spawned = std::thread::Builder::new()
            .name("motion-loop".into())
            .spawn(move || {
                ctx.run();
                let _ = done_tx.send(());
            });
        let handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                tracing::error!(error = %e, "could not spawn control loop");
                self.abandon_start();
                return Err(ControlError::Motor(crate::error::HwFault::Other(
                    e.to_string(),
                )));
            }
        };

        tracing::info!(
            target_cm = config.target_cm,
            reverse_brake = config.reverse_brake,
            "run started"
        );
        self.run = Some(ActiveRun {
            config,
            cancel: cancel_tx,
            done: done_rx,
            handle: Some(handle),
        });
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ControlError> {
        let bound = self.cfg.motion.stop_ack_timeout;
        let Some(active) = self.run.as_ref() else {
            return Err(ControlError::NotStarted);
        };
        let _ = active.cancel.try_send(());
        self.cut_power_within(bound);

        match active.done.recv_timeout(bound) {
            Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => {}
            Err(xch::RecvTimeoutError::Timeout) => {
                tracing::error!(?bound, "control loop did not acknowledge stop");
                return Err(ControlError::LoopUnresponsive(bound));
            }
        }

        self.reap();
        // The loop may have re-engaged between our cut and its exit
        self.cut_power_within(bound);

        let mut st = self.state.lock();
        st.run_start = None;
        if st.stage() != Stage::Stopped
            && let Err(e) = st.set_stage(Stage::Stopped)
        {
            tracing::warn!(error = %e, "stop from unexpected stage");
        }
        if let Err(e) = st.set_stage(Stage::Idle) {
            tracing::warn!(error = %e, "could not return to idle");
        }
        let distance_cm = st.distance_cm();
        drop(st);
        tracing::info!(distance_cm, "run stopped");
        Ok(())
    }

    pub fn status(&self) -> Result<DistanceSnapshot, ControlError> {
        let t = self.cfg.motion.lock_timeout;
        self.state
            .snapshot_within(t, Instant::now())
            .ok_or(ControlError::StatusLock(t))
    }

    /// Join a finished loop thread and disarm the sensor.
    fn reap(&mut self) {
        let Some(mut active) = self.run.take() else {
            return;
        };
        if let Some(handle) = active.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("control loop thread panicked");
        }
        if let Err(e) = self.sensor.clear_edge_callback() {
            tracing::warn!(error = %map_hw_error(&*e), "could not disarm odometer");
        }
    }

    fn mark_driving(&self, lock_timeout: Duration) -> Result<(), ControlError> {
        let mut st = self
            .state
            .lock_within(lock_timeout)
            .ok_or(ControlError::StartLock(lock_timeout))?;
        st.run_start = Some(Instant::now());
        st.direction = Polarity::Forward;
        st.set_stage(Stage::DrivingForward).map_err(|e| {
            tracing::error!(error = %e, "start rejected by stage machine");
            ControlError::AlreadyStarted
        })
    }

    /// Undo a partially applied START.
    fn abandon_start(&mut self) {
        if let Err(e) = self.motor.lock().cut_power() {
            tracing::warn!(error = %map_hw_error(&*e), "cut power failed");
        }
        if let Err(e) = self.sensor.clear_edge_callback() {
            tracing::warn!(error = %map_hw_error(&*e), "could not disarm odometer");
        }
    }

    fn cut_power_within(&self, bound: Duration) {
        match self.motor.try_lock_for(bound) {
            Some(mut m) => {
                if let Err(e) = m.cut_power() {
                    tracing::error!(error = %map_hw_error(&*e), "cut power failed");
                }
            }
            None => tracing::error!(?bound, "motor busy, power not cut"),
        }
    }
}

impl<M, S> Drop for MotionController<M, S>
where
    M: Motor + Send + 'static,
    S: MagnetSensor,
{
    fn drop(&mut self) {
        if self.run.is_none() {
            return;
        }
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "stop on drop");
            self.cut_power_within(self.cfg.motion.stop_ack_timeout);
        }
    }
}

/// Cuts motor power without going through the controller.
pub struct PowerCutter<M> {
    motor: Arc<Mutex<M>>,
}

impl<M: Motor> PowerCutter<M> {
    pub fn cut(&self) {
        let mut m = self.motor.lock();
        if let Err(e) = m.cut_power() {
            tracing::error!(error = %map_hw_error(&*e), "emergency cut failed");
        }
    }
}

impl<M> Clone for PowerCutter<M> {
    fn clone(&self) -> Self {
        Self {
            motor: self.motor.clone(),
        }
    }
}

enum Exit {
    Finished,
    Cancelled,
    Fault,
}

struct LoopCtx<M> {
    motor: Arc<Mutex<M>>,
    state: SharedState,
    run: RunConfig,
    motion: MotionCfg,
    tolerance_cm: f64,
    cancel: xch::Receiver<()>,
}

impl<M: Motor> LoopCtx<M> {
    fn run(self) {
        match self.drive() {
            Exit::Finished => self.finish(),
            Exit::Fault => {
                tracing::error!("run aborted by motor fault");
                self.finish();
            }
            Exit::Cancelled => {
                tracing::debug!("control loop cancelled");
                self.cut_power();
            }
        }
    }

    /// Wait up to `d`; true if cancellation arrived.
    fn cancelled_within(&self, d: Duration) -> bool {
        !matches!(
            self.cancel.recv_timeout(d),
            Err(xch::RecvTimeoutError::Timeout)
        )
    }

    fn cancel_pending(&self) -> bool {
        !matches!(self.cancel.try_recv(), Err(xch::TryRecvError::Empty))
    }

    fn set_stage(&self, to: Stage) {
        if let Err(e) = self.state.lock().set_stage(to) {
            tracing::warn!(error = %e, "stage change rejected");
        }
    }

    fn cut_power(&self) -> bool {
        match self.motor.lock().cut_power() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %map_hw_error(&*e), "cut power failed");
                false
            }
        }
    }

    fn drive(&self) -> Exit {
        let target = self.run.target_cm;
        let stop_at = target - self.motion.forward_leeway_cm;
        let creep_until = target + self.tolerance_cm;
        let mut cut_at = Instant::now();
        let mut attempts = 0u32;

        loop {
            let (stage, distance, last_edge) = {
                let st = self.state.lock();
                (st.stage(), st.distance_cm(), st.last_edge)
            };

            match stage {
                Stage::DrivingForward => {
                    if distance >= stop_at {
                        if !self.cut_power() {
                            return Exit::Fault;
                        }
                        cut_at = Instant::now();
                        self.set_stage(Stage::ReachedTarget);
                        tracing::info!(distance_cm = distance, target_cm = target, "target reached");
                    }
                }
                Stage::ReachedTarget => {
                    let now = Instant::now();
                    let settle = self.motion.coast_settle;
                    let quiet = last_edge.is_none_or(|t| now.saturating_duration_since(t) >= settle);
                    // Coasting edges keep counting until the wheel has been quiet for a settle window
                    if now.saturating_duration_since(cut_at) >= settle && quiet {
                        if !self.run.reverse_brake {
                            tracing::info!(distance_cm = distance, "coasted to a halt");
                            return Exit::Finished;
                        }
                        if distance <= creep_until {
                            tracing::info!(distance_cm = distance, "coasted within tolerance");
                            return Exit::Finished;
                        }
                        tracing::info!(overshoot_cm = distance - target, "creeping back");
                        self.set_stage(Stage::CreepingBackward);
                    }
                }
                Stage::CreepingBackward => {
                    if distance <= creep_until {
                        tracing::info!(distance_cm = distance, attempts, "creep converged");
                        return Exit::Finished;
                    }
                    if attempts >= self.motion.max_creep_attempts {
                        tracing::warn!(distance_cm = distance, attempts, "creep attempts exhausted");
                        return Exit::Finished;
                    }
                    attempts += 1;
                    self.state.lock().direction = Polarity::Backward;
                    let reversed = {
                        let mut motor = self.motor.lock();
                        // STOP signals before it takes the motor; checking under the lock
                        // means a cut it already made is never undone
                        if self.cancel_pending() {
                            return Exit::Cancelled;
                        }
                        motor.drive_backward()
                    };
                    if let Err(e) = reversed {
                        tracing::error!(error = %map_hw_error(&*e), "reverse drive failed");
                        return Exit::Fault;
                    }
                    if self.cancelled_within(self.motion.creep_pulse) {
                        return Exit::Cancelled;
                    }
                    if !self.cut_power() {
                        return Exit::Fault;
                    }
                    if self.cancelled_within(self.motion.creep_settle) {
                        return Exit::Cancelled;
                    }
                    continue;
                }
                Stage::Idle | Stage::Stopped => return Exit::Cancelled,
            }

            if self.cancelled_within(self.motion.poll) {
                return Exit::Cancelled;
            }
        }
    }

    fn finish(&self) {
        self.cut_power();
        let mut st = self.state.lock();
        st.run_start = None;
        if let Err(e) = st.set_stage(Stage::Stopped) {
            tracing::warn!(error = %e, "could not mark run stopped");
        }
        tracing::info!(
            distance_cm = st.distance_cm(),
            hits = st.magnet_hit_counter(),
            "run finished"
        );
    }
}
