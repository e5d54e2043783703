//! Relay-switched DC motor with a polarity interlock.
//!
//! A direction change always releases the opposite pair, waits the interlock
//! dead time, then engages the requested pair. Cutting power releases both
//! pairs immediately.

use std::time::Duration;

use car_traits::{Clock, Motor, Polarity, RelayBank};

pub struct RelayMotor<R, C> {
    relays: R,
    clock: C,
    interlock: Duration,
    engaged: Option<Polarity>,
}

impl<R: RelayBank, C: Clock> RelayMotor<R, C> {
    pub fn new(relays: R, clock: C, interlock: Duration) -> Self {
        Self {
            relays,
            clock,
            interlock,
            engaged: None,
        }
    }

    /// Pair currently believed engaged.
    pub fn engaged(&self) -> Option<Polarity> {
        self.engaged
    }

    fn drive(
        &mut self,
        polarity: Polarity,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.engaged == Some(polarity) {
            return Ok(());
        }
        // Unknown state after a failed write: release before anything else
        self.engaged = None;
        self.relays.set_pair(polarity.opposite(), false)?;
        self.clock.sleep(self.interlock);
        self.relays.set_pair(polarity, true)?;
        self.engaged = Some(polarity);
        tracing::debug!(?polarity, "motor driving");
        Ok(())
    }
}

impl<R: RelayBank, C: Clock> Motor for RelayMotor<R, C> {
    fn drive_forward(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.drive(Polarity::Forward)
    }

    fn drive_backward(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.drive(Polarity::Backward)
    }

    fn cut_power(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.engaged = None;
        self.relays.release_all()?;
        tracing::debug!("motor power cut");
        Ok(())
    }
}
