// src/relay.rs - Appliances behind the relay board and their switch states
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::gpio::GpioError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("state should be given as ON or OFF, got '{0}'")]
    InvalidState(String),
    #[error("Unknown output: {0}")]
    UnknownOutput(String),
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

/// An appliance wired to one channel of the relay board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Appliance {
    /// 5V fan for cooling the tank, relay one
    Fan,
    /// Fogger, relay two
    Mister,
    /// Main tank light, relay three
    Light,
    /// Fills the fogger's top reservoir, relay four
    WaterPump,
}

impl Appliance {
    pub const ALL: [Appliance; 4] = [
        Appliance::Fan,
        Appliance::Mister,
        Appliance::Light,
        Appliance::WaterPump,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Appliance::Fan => "fan",
            Appliance::Mister => "mister",
            Appliance::Light => "light",
            Appliance::WaterPump => "pump",
        }
    }

    pub fn relay_label(&self) -> &'static str {
        match self {
            Appliance::Fan => "relay one",
            Appliance::Mister => "relay two",
            Appliance::Light => "relay three",
            Appliance::WaterPump => "relay four",
        }
    }
}

impl fmt::Display for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Appliance {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fan" => Ok(Appliance::Fan),
            "mister" | "fogger" => Ok(Appliance::Mister),
            "light" => Ok(Appliance::Light),
            "pump" | "water" => Ok(Appliance::WaterPump),
            _ => Err(ControlError::UnknownOutput(s.to_string())),
        }
    }
}

/// Requested appliance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    /// Logic level that puts the relay in this state.
    ///
    /// The relays are active-low: driving the pin low energizes the appliance.
    pub fn relay_level(self) -> bool {
        match self {
            Switch::On => false,
            Switch::Off => true,
        }
    }

    pub fn from_relay_level(high: bool) -> Self {
        if high { Switch::Off } else { Switch::On }
    }
}

impl fmt::Display for Switch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Switch::On => f.write_str("ON"),
            Switch::Off => f.write_str("OFF"),
        }
    }
}

impl FromStr for Switch {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("on") {
            Ok(Switch::On)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Switch::Off)
        } else {
            Err(ControlError::InvalidState(s.to_string()))
        }
    }
}
