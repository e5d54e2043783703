use std::f64::consts::PI;
use std::thread;
use std::time::{Duration, Instant};

use car_core::mocks::{ManualSensor, MotorEvent, RecordingMotor};
use car_core::{
    ControlError, ControllerCfg, MotionCfg, MotionController, OdometerCfg, RunConfig, Stage,
    VehicleCfg,
};

const SETTLE: Duration = Duration::from_millis(60);

/// One magnet on a wheel of circumference 10 cm: every edge is 10 cm.
fn cfg(max_creep_attempts: u32) -> ControllerCfg {
    ControllerCfg {
        vehicle: VehicleCfg {
            number_of_magnets: 1,
            wheel_diameter_cm: 10.0 / PI,
        },
        motion: MotionCfg {
            poll: Duration::from_millis(2),
            coast_settle: SETTLE,
            creep_pulse: Duration::from_millis(5),
            creep_settle: Duration::from_millis(20),
            max_creep_attempts,
            backward_tolerance_cm: Some(2.0),
            lock_timeout: Duration::from_millis(200),
            ..MotionCfg::default()
        },
        odometer: OdometerCfg {
            debounce: Duration::ZERO,
        },
    }
}

fn rig(
    max_creep_attempts: u32,
) -> (
    MotionController<RecordingMotor, ManualSensor>,
    RecordingMotor,
    ManualSensor,
) {
    let motor = RecordingMotor::new();
    let sensor = ManualSensor::new();
    let ctl = MotionController::new(motor.clone(), sensor.clone(), cfg(max_creep_attempts));
    (ctl, motor, sensor)
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

fn stage(ctl: &MotionController<RecordingMotor, ManualSensor>) -> Stage {
    ctl.status().unwrap().stage
}

fn first(events: &[(Instant, MotorEvent)], which: MotorEvent) -> Option<Instant> {
    events.iter().find(|(_, e)| *e == which).map(|(t, _)| *t)
}

#[test]
fn reaching_target_cuts_power_and_finishes() {
    let (mut ctl, motor, sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: false,
    })
    .unwrap();
    sensor.fire(3);

    assert!(wait_for(|| stage(&ctl) == Stage::Stopped));
    let snap = ctl.status().unwrap();
    assert!(!snap.running());
    assert_eq!(snap.runtime, Duration::ZERO);
    assert_eq!(snap.magnet_hit_counter, 3);
    assert_eq!(&motor.events()[..2], &[MotorEvent::Forward, MotorEvent::Cut]);
    assert!(!motor.events().contains(&MotorEvent::Backward));

    // a finished run is still owned until STOP reaps it
    ctl.stop().unwrap();
    assert_eq!(stage(&ctl), Stage::Idle);
    assert!(!sensor.armed());
}

#[test]
fn start_after_natural_finish_needs_no_stop() {
    let (mut ctl, _motor, sensor) = rig(3);
    let run = RunConfig {
        target_cm: 5.0,
        reverse_brake: false,
    };
    ctl.start(run).unwrap();
    sensor.fire(1);
    assert!(wait_for(|| stage(&ctl) == Stage::Stopped));

    ctl.start(run).unwrap();
    let snap = ctl.status().unwrap();
    assert_eq!(snap.stage, Stage::DrivingForward);
    assert_eq!(snap.magnet_hit_counter, 0);
    assert!(sensor.armed());
}

#[test]
fn creep_waits_for_coast_then_reverses_until_within_tolerance() {
    let (mut ctl, motor, sensor) = rig(8);
    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: true,
    })
    .unwrap();
    sensor.fire(4); // 40 cm, overshoot beyond 25 + 2

    assert!(wait_for(|| motor.events().contains(&MotorEvent::Backward)));
    // backward edges pull the distance under 27 cm
    sensor.fire(2);
    assert!(wait_for(|| stage(&ctl) == Stage::Stopped));

    let snap = ctl.status().unwrap();
    assert_eq!(snap.magnet_hit_counter, 6);
    assert!(snap.distance_cm <= 27.0, "{}", snap.distance_cm);

    let events = motor.timed_events();
    let cut = first(&events, MotorEvent::Cut).unwrap();
    let back = first(&events, MotorEvent::Backward).unwrap();
    assert!(cut < back, "power must be cut before reversing");
    assert!(back.duration_since(cut) >= SETTLE);
    assert_eq!(events.last().map(|(_, e)| *e), Some(MotorEvent::Cut));
}

#[test]
fn edges_during_coast_postpone_the_creep() {
    let (mut ctl, motor, sensor) = rig(1);
    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: true,
    })
    .unwrap();
    sensor.fire(3);
    assert!(wait_for(|| stage(&ctl) == Stage::ReachedTarget));

    thread::sleep(SETTLE / 2);
    let last_edge = Instant::now();
    sensor.fire(1); // still rolling

    assert!(wait_for(|| motor.events().contains(&MotorEvent::Backward)));
    let back = first(&motor.timed_events(), MotorEvent::Backward).unwrap();
    assert!(back.duration_since(last_edge) >= SETTLE);
}

#[test]
fn creep_gives_up_after_max_attempts() {
    let (mut ctl, motor, sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: true,
    })
    .unwrap();
    sensor.fire(4);

    assert!(wait_for(|| stage(&ctl) == Stage::Stopped));
    let backs = motor
        .events()
        .iter()
        .filter(|e| **e == MotorEvent::Backward)
        .count();
    assert_eq!(backs, 3);
}

#[test]
fn within_tolerance_after_coast_skips_the_creep() {
    let (mut ctl, motor, sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 29.0,
        reverse_brake: true,
    })
    .unwrap();
    sensor.fire(3); // 30 cm, within 29 + 2

    assert!(wait_for(|| stage(&ctl) == Stage::Stopped));
    assert!(!motor.events().contains(&MotorEvent::Backward));
}

#[test]
fn start_while_running_is_rejected_without_side_effects() {
    let (mut ctl, motor, _sensor) = rig(3);
    let run = RunConfig {
        target_cm: 1000.0,
        reverse_brake: false,
    };
    ctl.start(run).unwrap();
    assert_eq!(ctl.start(run), Err(ControlError::AlreadyStarted));
    assert_eq!(stage(&ctl), Stage::DrivingForward);
    assert_eq!(ctl.current_run(), Some(run));
    assert_eq!(motor.events(), vec![MotorEvent::Forward]);
}

#[test]
fn stop_interrupts_a_creep_without_further_reversal() {
    let (mut ctl, motor, sensor) = rig(50);
    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: true,
    })
    .unwrap();
    sensor.fire(5);
    assert!(wait_for(|| motor.events().contains(&MotorEvent::Backward)));

    ctl.stop().unwrap();
    let n = motor.events().len();
    assert_eq!(motor.events().last(), Some(&MotorEvent::Cut));
    assert_eq!(stage(&ctl), Stage::Idle);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(motor.events().len(), n, "loop kept driving after STOP");
}

#[test]
fn stop_without_run_is_not_started() {
    let (mut ctl, _motor, _sensor) = rig(3);
    assert_eq!(ctl.stop(), Err(ControlError::NotStarted));
}

#[test]
fn dropping_the_controller_cuts_power() {
    let (mut ctl, motor, _sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 1000.0,
        reverse_brake: false,
    })
    .unwrap();
    drop(ctl);
    assert_eq!(motor.events().last(), Some(&MotorEvent::Cut));
}

#[test]
fn power_cutter_works_from_another_thread() {
    let (mut ctl, motor, _sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 1000.0,
        reverse_brake: false,
    })
    .unwrap();
    let cutter = ctl.power_cutter();
    thread::spawn(move || cutter.cut()).join().unwrap();
    assert_eq!(motor.events(), vec![MotorEvent::Forward, MotorEvent::Cut]);
}

#[test]
fn status_snapshots_are_never_torn() {
    let (mut ctl, _motor, sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 1.0e9,
        reverse_brake: false,
    })
    .unwrap();

    let firing = thread::spawn(move || {
        for _ in 0..500 {
            sensor.fire(1);
        }
    });
    let mut seen = 0u64;
    while !firing.is_finished() || seen < 500 {
        let snap = ctl.status().unwrap();
        let expected = snap.magnet_hit_counter as f64 * 10.0;
        assert!(
            (snap.distance_cm - expected).abs() < 1e-6,
            "distance {} vs {} hits",
            snap.distance_cm,
            snap.magnet_hit_counter
        );
        assert!(snap.magnet_hit_counter >= seen, "hit counter went backwards");
        seen = snap.magnet_hit_counter;
        if firing.is_finished() && seen >= 500 {
            break;
        }
    }
    firing.join().unwrap();
}

#[test]
fn coasting_edges_count_after_the_cut_without_brake() {
    let (mut ctl, motor, sensor) = rig(3);
    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: false,
    })
    .unwrap();
    sensor.fire(3);
    assert!(wait_for(|| stage(&ctl) == Stage::ReachedTarget));
    assert_eq!(motor.events().last(), Some(&MotorEvent::Cut));

    // still rolling after the cut
    assert!(sensor.armed());
    sensor.fire(2);
    assert!(wait_for(|| stage(&ctl) == Stage::Stopped));

    let snap = ctl.status().unwrap();
    assert_eq!(snap.magnet_hit_counter, 5);
    assert!((snap.distance_cm - 50.0).abs() < 1e-9, "{}", snap.distance_cm);
    assert!(!motor.events().contains(&MotorEvent::Backward));
}

/// Hold the distance lock on another thread for `hold`.
fn hold_distance_lock(
    ctl: &MotionController<RecordingMotor, ManualSensor>,
    hold: Duration,
) -> thread::JoinHandle<()> {
    let shared = ctl.shared_state();
    let (locked_tx, locked_rx) = std::sync::mpsc::channel();
    let holder = thread::spawn(move || {
        let _guard = shared.lock_within(Duration::from_secs(1)).unwrap();
        locked_tx.send(()).unwrap();
        thread::sleep(hold);
    });
    locked_rx.recv().unwrap();
    holder
}

#[test]
fn start_gives_up_when_the_distance_lock_is_held() {
    let (mut ctl, motor, sensor) = rig(3);
    let holder = hold_distance_lock(&ctl, Duration::from_millis(600));

    let err = ctl
        .start(RunConfig {
            target_cm: 25.0,
            reverse_brake: false,
        })
        .unwrap_err();
    assert!(matches!(err, ControlError::StartLock(_)), "{err:?}");
    assert_eq!(err.variant().code(), 24);
    assert!(motor.events().is_empty());
    assert!(!sensor.armed());
    holder.join().unwrap();
}

#[test]
fn status_gives_up_when_the_distance_lock_is_held() {
    let (ctl, _motor, _sensor) = rig(3);
    let holder = hold_distance_lock(&ctl, Duration::from_millis(600));

    let err = ctl.status().unwrap_err();
    assert!(matches!(err, ControlError::StatusLock(_)), "{err:?}");
    assert_eq!(err.variant().code(), 27);
    holder.join().unwrap();
    assert!(ctl.status().is_ok());
}

#[test]
fn stop_reports_an_unresponsive_loop_and_can_be_retried() {
    let mut cfg = cfg(3);
    cfg.motion.stop_ack_timeout = Duration::from_millis(50);
    let motor = RecordingMotor::new();
    let sensor = ManualSensor::new();
    let mut ctl = MotionController::new(motor.clone(), sensor.clone(), cfg);
    motor.stall_backward(Duration::from_millis(400));

    ctl.start(RunConfig {
        target_cm: 25.0,
        reverse_brake: true,
    })
    .unwrap();
    sensor.fire(5);
    assert!(wait_for(|| stage(&ctl) == Stage::CreepingBackward));
    // the loop is now stuck inside the reverse command
    thread::sleep(Duration::from_millis(30));

    let err = ctl.stop().unwrap_err();
    assert!(matches!(err, ControlError::LoopUnresponsive(_)), "{err:?}");
    assert_eq!(err.variant().code(), 26);
    assert!(ctl.current_run().is_some());

    thread::sleep(Duration::from_millis(500));
    ctl.stop().unwrap();
    assert_eq!(stage(&ctl), Stage::Idle);
    assert_eq!(motor.events().last(), Some(&MotorEvent::Cut));
}
