// src/gpio/mod.rs - Digital pin access behind a swappable backend
pub mod simulated;
pub mod sysfs;

use async_trait::async_trait;
use thiserror::Error;

pub use simulated::{SimulatedGpio, WriteRecord};
pub use sysfs::SysfsGpio;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO {pin} I/O error: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("GPIO {0} is not configured")]
    NotConfigured(u32),
    #[error("GPIO {pin} returned invalid value '{value}'")]
    InvalidValue { pin: u32, value: String },
}

/// Raw digital I/O. Levels are logic levels: `true` is high.
///
/// Implementations must be shareable between the monitor task, the reversion
/// timers and the keyboard handler.
#[async_trait]
pub trait GpioBackend: Send + Sync {
    /// Claim `pin` as an output, driving it to `initial` straight away.
    async fn setup_output(&self, pin: u32, initial: bool) -> Result<(), GpioError>;
    async fn setup_input(&self, pin: u32) -> Result<(), GpioError>;
    async fn write(&self, pin: u32, high: bool) -> Result<(), GpioError>;
    async fn read(&self, pin: u32) -> Result<bool, GpioError>;
    async fn release(&self, pin: u32) -> Result<(), GpioError>;
}
