//! Motion stages and the transitions allowed between them.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    /// No run configured.
    #[default]
    Idle,
    DrivingForward,
    /// Power cut at the target; the vehicle may still be coasting.
    ReachedTarget,
    CreepingBackward,
    /// Run over and power cut. Left by STOP (to Idle) or the next START.
    Stopped,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal stage transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: Stage,
    pub to: Stage,
}

impl Stage {
    /// Numeric code reported in STATUS.
    pub fn code(self) -> u8 {
        match self {
            Stage::Idle => 0,
            Stage::DrivingForward => 1,
            Stage::ReachedTarget => 2,
            Stage::CreepingBackward => 3,
            Stage::Stopped => 4,
        }
    }

    /// A run is active: the motor may be powered and the loop is polling.
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Stage::DrivingForward | Stage::ReachedTarget | Stage::CreepingBackward
        )
    }

    pub fn can_transition(self, to: Stage) -> bool {
        use Stage::*;
        match (self, to) {
            (Idle | Stopped, DrivingForward) => true,
            (DrivingForward, ReachedTarget) => true,
            (ReachedTarget, CreepingBackward | Stopped) => true,
            (CreepingBackward, Stopped) => true,
            // Emergency stop before the target
            (DrivingForward, Stopped) => true,
            (Stopped, Idle) => true,
            _ => false,
        }
    }

    pub fn transition(self, to: Stage) -> Result<Stage, InvalidTransition> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}
