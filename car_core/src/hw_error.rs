//! Maps `Box<dyn Error>` from trait boundaries to a typed `HwFault`.
//!
//! The capability traits in `car_traits` return boxed errors; with the
//! `hardware-errors` feature the known `car_hardware::error::HwError` cases
//! are recognised precisely.

use crate::error::HwFault;

pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> HwFault {
    #[cfg(feature = "hardware-errors")]
    {
        use car_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::ShootThrough => HwFault::Interlock(hw.to_string()),
                HwError::RelayMismatch { .. } => HwFault::Interlock(hw.to_string()),
                other => HwFault::Fault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("both relay pairs") {
        HwFault::Interlock(s)
    } else {
        HwFault::Other(s)
    }
}
