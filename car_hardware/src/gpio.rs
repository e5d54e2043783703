//! Raspberry Pi GPIO backends (rppal): relay H-bridge and hall-effect sensor.

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};

use car_traits::{EdgeCallback, MagnetSensor, Polarity, RelayBank};

use crate::error::{HwError, Result};

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// BCM pin numbers of the four relays.
#[derive(Debug, Clone, Copy)]
pub struct RelayPins {
    pub forward_pos: u8,
    pub forward_neg: u8,
    pub backward_pos: u8,
    pub backward_neg: u8,
}

struct RelayPair {
    pos: (u8, OutputPin),
    neg: (u8, OutputPin),
}

/// Four relays forming two polarity pairs. Every write is read back.
pub struct GpioRelayBank {
    forward: RelayPair,
    backward: RelayPair,
    active_low: bool,
}

impl GpioRelayBank {
    pub fn new(pins: RelayPins, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let out = |pin: u8| -> Result<(u8, OutputPin)> {
            let mut p = gpio.get(pin).map_err(gpio_err)?.into_output();
            // Start released
            p.write(if active_low { Level::High } else { Level::Low });
            Ok((pin, p))
        };
        let bank = Self {
            forward: RelayPair {
                pos: out(pins.forward_pos)?,
                neg: out(pins.forward_neg)?,
            },
            backward: RelayPair {
                pos: out(pins.backward_pos)?,
                neg: out(pins.backward_neg)?,
            },
            active_low,
        };
        tracing::info!(?pins, active_low, "gpio relay bank ready");
        Ok(bank)
    }

    fn level_for(&self, engaged: bool) -> Level {
        // Active-low relays energize on LOW
        match (engaged, self.active_low) {
            (true, false) | (false, true) => Level::High,
            (true, true) | (false, false) => Level::Low,
        }
    }
}

fn write_checked(pin: &mut (u8, OutputPin), level: Level) -> Result<()> {
    pin.1.write(level);
    let latched = match level {
        Level::High => pin.1.is_set_high(),
        Level::Low => pin.1.is_set_low(),
    };
    if !latched {
        return Err(HwError::RelayMismatch {
            pin: pin.0,
            expected: if level == Level::High { "high" } else { "low" },
        });
    }
    Ok(())
}

impl RelayBank for GpioRelayBank {
    fn set_pair(
        &mut self,
        polarity: Polarity,
        engaged: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let level = self.level_for(engaged);
        let pair = match polarity {
            Polarity::Forward => &mut self.forward,
            Polarity::Backward => &mut self.backward,
        };
        write_checked(&mut pair.pos, level)?;
        write_checked(&mut pair.neg, level)?;
        tracing::trace!(?polarity, engaged, "relay pair set");
        Ok(())
    }
}

/// Hall-effect sensor on a pulled-up input; a passing magnet pulls it low.
pub struct HallSensor {
    pin: InputPin,
}

impl HallSensor {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let pin = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        Ok(Self { pin })
    }
}

impl MagnetSensor for HallSensor {
    fn register_edge_callback(
        &mut self,
        mut callback: EdgeCallback,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin
            .set_async_interrupt(Trigger::FallingEdge, move |_level: Level| callback())
            .map_err(gpio_err)?;
        tracing::debug!(pin = self.pin.pin(), "hall sensor armed");
        Ok(())
    }

    fn clear_edge_callback(
        &mut self,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.clear_async_interrupt().map_err(gpio_err)?;
        tracing::debug!(pin = self.pin.pin(), "hall sensor disarmed");
        Ok(())
    }
}
