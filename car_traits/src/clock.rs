use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source shared by the motor interlock and the odometer.
///
/// - now(): monotonic Instant
/// - sleep(): block for the duration (test clocks advance instead)
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time since `epoch`, zero if `epoch` lies in the future.
    fn elapsed_since(&self, epoch: Instant) -> Duration {
        self.now().saturating_duration_since(epoch)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when slept on.
    #[derive(Clone)]
    struct ManualClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + *self.offset.lock().unwrap()
        }

        fn sleep(&self, d: Duration) {
            *self.offset.lock().unwrap() += d;
        }
    }

    #[test]
    fn elapsed_since_tracks_sleeps() {
        let clock = ManualClock {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        };
        let epoch = clock.now();
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.elapsed_since(epoch), Duration::from_millis(250));
    }

    #[test]
    fn elapsed_since_future_epoch_is_zero() {
        let clock = MonotonicClock::new();
        let future = clock.now() + Duration::from_secs(5);
        assert_eq!(clock.elapsed_since(future), Duration::ZERO);
    }

    #[test]
    fn monotonic_zero_sleep_returns_immediately() {
        let clock = MonotonicClock::new();
        let before = Instant::now();
        clock.sleep(Duration::ZERO);
        assert!(before.elapsed() < Duration::from_millis(50));
    }
}
