// src/gpio/simulated.rs - In-memory GPIO for dry runs and tests
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{GpioBackend, GpioError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

/// One level change on an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub pin: u32,
    pub high: bool,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct SimState {
    directions: HashMap<u32, Direction>,
    levels: HashMap<u32, bool>,
    writes: Vec<WriteRecord>,
}

/// GPIO backend that keeps pin levels in memory.
///
/// Input levels are driven with [`SimulatedGpio::set_input`]; every output
/// write is kept in order so callers can inspect what was driven and when.
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    state: Mutex<SimState>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A poisoned lock only means a test panicked mid-write; the map is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drive an input pin, as the Feather would.
    pub fn set_input(&self, pin: u32, high: bool) {
        tracing::debug!("Simulated input GPIO {} -> {}", pin, high);
        self.lock().levels.insert(pin, high);
    }

    /// Current level of any pin, if it has ever been set.
    pub fn level(&self, pin: u32) -> Option<bool> {
        self.lock().levels.get(&pin).copied()
    }

    pub fn is_configured(&self, pin: u32) -> bool {
        self.lock().directions.contains_key(&pin)
    }

    /// All output writes so far, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn writes_to(&self, pin: u32) -> Vec<WriteRecord> {
        self.lock()
            .writes
            .iter()
            .filter(|record| record.pin == pin)
            .copied()
            .collect()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }
}

#[async_trait]
impl GpioBackend for SimulatedGpio {
    async fn setup_output(&self, pin: u32, initial: bool) -> Result<(), GpioError> {
        let mut state = self.lock();
        state.directions.insert(pin, Direction::Output);
        state.levels.insert(pin, initial);
        state.writes.push(WriteRecord {
            pin,
            high: initial,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn setup_input(&self, pin: u32) -> Result<(), GpioError> {
        let mut state = self.lock();
        state.directions.insert(pin, Direction::Input);
        state.levels.entry(pin).or_insert(false);
        Ok(())
    }

    async fn write(&self, pin: u32, high: bool) -> Result<(), GpioError> {
        let mut state = self.lock();
        if state.directions.get(&pin) != Some(&Direction::Output) {
            return Err(GpioError::NotConfigured(pin));
        }
        state.levels.insert(pin, high);
        state.writes.push(WriteRecord {
            pin,
            high,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn read(&self, pin: u32) -> Result<bool, GpioError> {
        let state = self.lock();
        if !state.directions.contains_key(&pin) {
            return Err(GpioError::NotConfigured(pin));
        }
        Ok(state.levels.get(&pin).copied().unwrap_or(false))
    }

    async fn release(&self, pin: u32) -> Result<(), GpioError> {
        self.lock().directions.remove(&pin);
        Ok(())
    }
}
