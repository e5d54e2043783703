//! Simulated relays and hall sensor sharing one virtual wheel.
//!
//! The wheel turns while exactly one relay pair is engaged; the simulated
//! sensor then fires an edge every `edge_interval`. Engaging both pairs at
//! once is reported as [`HwError::ShootThrough`], which lets tests catch a
//! broken interlock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use car_traits::{EdgeCallback, MagnetSensor, Polarity, RelayBank};

use crate::error::HwError;

const FORWARD_BIT: u8 = 0b01;
const BACKWARD_BIT: u8 = 0b10;

fn bit(p: Polarity) -> u8 {
    match p {
        Polarity::Forward => FORWARD_BIT,
        Polarity::Backward => BACKWARD_BIT,
    }
}

/// Shared state of the virtual wheel.
#[derive(Debug, Clone, Default)]
pub struct SimWheel {
    engaged: Arc<AtomicU8>,
    edges: Arc<AtomicU64>,
}

impl SimWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction the wheel is currently driven in, if any.
    pub fn driven(&self) -> Option<Polarity> {
        match self.engaged.load(Ordering::Acquire) {
            FORWARD_BIT => Some(Polarity::Forward),
            BACKWARD_BIT => Some(Polarity::Backward),
            _ => None,
        }
    }

    /// Edges emitted by the simulated sensor so far.
    pub fn edges_emitted(&self) -> u64 {
        self.edges.load(Ordering::Relaxed)
    }
}

pub struct SimulatedRelayBank {
    wheel: SimWheel,
}

impl SimulatedRelayBank {
    pub fn new(wheel: SimWheel) -> Self {
        Self { wheel }
    }
}

impl RelayBank for SimulatedRelayBank {
    fn set_pair(
        &mut self,
        polarity: Polarity,
        engaged: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let b = bit(polarity);
        if engaged {
            let prev = self.wheel.engaged.fetch_or(b, Ordering::AcqRel);
            if prev & bit(polarity.opposite()) != 0 {
                tracing::error!(?polarity, "simulated relays: both pairs engaged");
                return Err(Box::new(HwError::ShootThrough));
            }
        } else {
            self.wheel.engaged.fetch_and(!b, Ordering::AcqRel);
        }
        tracing::trace!(?polarity, engaged, "simulated relay pair");
        Ok(())
    }
}

/// Hall sensor that emits edges from a background thread while the wheel turns.
pub struct SimulatedMagnetSensor {
    wheel: SimWheel,
    edge_interval: Duration,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl SimulatedMagnetSensor {
    pub fn new(wheel: SimWheel, edge_interval: Duration) -> Self {
        Self {
            wheel,
            edge_interval: edge_interval.max(Duration::from_millis(1)),
            shutdown: Arc::new(AtomicBool::new(false)),
            join_handle: None,
        }
    }

    fn stop_thread(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("simulated sensor thread panicked");
        }
    }
}

impl MagnetSensor for SimulatedMagnetSensor {
    fn register_edge_callback(
        &mut self,
        mut callback: EdgeCallback,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.stop_thread();
        let shutdown = Arc::new(AtomicBool::new(false));
        self.shutdown = shutdown.clone();
        let wheel = self.wheel.clone();
        let period = self.edge_interval;

        let handle = std::thread::Builder::new()
            .name("sim-hall".into())
            .spawn(move || {
                while !shutdown.load(Ordering::Relaxed) {
                    std::thread::sleep(period);
                    if wheel.driven().is_some() && !shutdown.load(Ordering::Relaxed) {
                        wheel.edges.fetch_add(1, Ordering::Relaxed);
                        callback();
                    }
                }
                tracing::trace!("simulated sensor thread exiting");
            })
            .map_err(|_| HwError::SensorThread)?;
        self.join_handle = Some(handle);
        tracing::debug!(interval_ms = period.as_millis() as u64, "simulated sensor armed");
        Ok(())
    }

    fn clear_edge_callback(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.stop_thread();
        tracing::debug!("simulated sensor disarmed");
        Ok(())
    }
}

impl Drop for SimulatedMagnetSensor {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
