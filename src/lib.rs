// src/lib.rs - Paludarium relay and LED controller
pub mod board;
pub mod config;
pub mod controller;
pub mod gpio;
pub mod hotkeys;
pub mod monitor;
pub mod relay;

pub use board::{Board, BoardState, OutputId};
pub use config::{load_config, Config, ConfigError};
pub use controller::{ControllerError, Paludarium};
pub use gpio::{GpioBackend, GpioError, SimulatedGpio, SysfsGpio};
pub use relay::{Appliance, ControlError, Switch};
