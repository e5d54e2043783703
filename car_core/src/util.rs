//! Time helpers shared by the dispatcher and tests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time as fractional unix seconds.
///
/// A clock set before 1970 reads as 0.0.
#[inline]
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Whole seconds, truncated, as reported by STATUS.
#[inline]
pub fn whole_secs(d: Duration) -> u64 {
    d.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_now_is_after_2020() {
        assert!(unix_now() > 1_577_836_800.0);
    }

    #[test]
    fn whole_secs_truncates() {
        assert_eq!(whole_secs(Duration::from_millis(2999)), 2);
        assert_eq!(whole_secs(Duration::ZERO), 0);
    }
}
