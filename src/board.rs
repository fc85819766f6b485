// src/board.rs - Named output pins and the thermal signal input
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::PinConfig;
use crate::gpio::{GpioBackend, GpioError};
use crate::relay::{Appliance, ControlError, Switch};

/// Board handle shared by the monitor, the reversion timers and the hotkeys.
pub type SharedBoard = Arc<Mutex<Board>>;

/// Semantic role of an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputId {
    Led(u8),
    Relay(Appliance),
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputId::Led(index) => write!(f, "led{}", index),
            OutputId::Relay(appliance) => write!(f, "{}", appliance),
        }
    }
}

impl FromStr for OutputId {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        if let Some(index) = name.strip_prefix("led") {
            return index
                .parse::<u8>()
                .map(OutputId::Led)
                .map_err(|_| ControlError::UnknownOutput(s.to_string()));
        }
        name.parse::<Appliance>().map(OutputId::Relay)
    }
}

#[derive(Debug, Clone)]
pub struct OutputPin {
    pub pin: u32,
    /// Logic level last written
    pub state: bool,
    pub role: OutputId,
}

impl OutputPin {
    /// Whether whatever hangs off this pin is running. Relays invert.
    pub fn is_active(&self) -> bool {
        match self.role {
            OutputId::Led(_) => self.state,
            OutputId::Relay(_) => !self.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputState {
    pub role: OutputId,
    pub pin: u32,
    pub high: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardState {
    pub outputs: Vec<OutputState>,
    pub signal_pin: u32,
}

impl BoardState {
    pub fn output(&self, role: OutputId) -> Option<&OutputState> {
        self.outputs.iter().find(|o| o.role == role)
    }

    pub fn is_running(&self, appliance: Appliance) -> bool {
        self.output(OutputId::Relay(appliance))
            .map(|o| o.active)
            .unwrap_or(false)
    }
}

/// All pins of the controller over one GPIO backend.
pub struct Board {
    backend: Arc<dyn GpioBackend>,
    outputs: Vec<OutputPin>,
    signal_pin: u32,
}

impl Board {
    /// Claim every pin: LEDs low, relays high (appliances off), signal as input.
    pub async fn init(pins: &PinConfig, backend: Arc<dyn GpioBackend>) -> Result<Self, GpioError> {
        tracing::info!("Initializing GPIO pins");
        let mut outputs = Vec::with_capacity(pins.leds.len() + Appliance::ALL.len());

        // Config validation caps the LED count at what a u8 index covers
        for (&pin, index) in pins.leds.iter().zip(0..=u8::MAX) {
            backend.setup_output(pin, false).await?;
            outputs.push(OutputPin {
                pin,
                state: false,
                role: OutputId::Led(index),
            });
        }

        for appliance in Appliance::ALL {
            let pin = match appliance {
                Appliance::Fan => pins.fan,
                Appliance::Mister => pins.mister,
                Appliance::Light => pins.light,
                Appliance::WaterPump => pins.pump,
            };
            let level = Switch::Off.relay_level();
            backend.setup_output(pin, level).await?;
            outputs.push(OutputPin {
                pin,
                state: level,
                role: OutputId::Relay(appliance),
            });
        }

        backend.setup_input(pins.signal).await?;
        tracing::debug!("Signal input on GPIO {}", pins.signal);

        Ok(Self {
            backend,
            outputs,
            signal_pin: pins.signal,
        })
    }

    pub fn into_shared(self) -> SharedBoard {
        Arc::new(Mutex::new(self))
    }

    pub fn output(&self, role: OutputId) -> Option<&OutputPin> {
        self.outputs.iter().find(|o| o.role == role)
    }

    fn output_mut(&mut self, role: OutputId) -> Result<&mut OutputPin, ControlError> {
        self.outputs
            .iter_mut()
            .find(|o| o.role == role)
            .ok_or_else(|| ControlError::UnknownOutput(role.to_string()))
    }

    /// Invert the logic level of an output. Returns the new level.
    pub async fn toggle(&mut self, role: OutputId) -> Result<bool, ControlError> {
        let backend = self.backend.clone();
        let output = self.output_mut(role)?;
        let level = !output.state;
        if output.state {
            tracing::info!("Turning off pin {}", output.pin);
        } else {
            tracing::info!("Turning on pin {}", output.pin);
        }
        backend.write(output.pin, level).await?;
        output.state = level;
        Ok(level)
    }

    /// Switch an appliance through its active-low relay.
    pub async fn control(&mut self, appliance: Appliance, switch: Switch) -> Result<(), ControlError> {
        let backend = self.backend.clone();
        let output = self.output_mut(OutputId::Relay(appliance))?;
        tracing::info!(
            "Turning {} {} connected to {}...",
            switch,
            appliance,
            appliance.relay_label()
        );
        let level = switch.relay_level();
        backend.write(output.pin, level).await?;
        output.state = level;
        Ok(())
    }

    /// Like [`Board::control`], with the state given as text ("on"/"off", any case).
    /// An invalid state touches no pin.
    pub async fn control_str(&mut self, appliance: Appliance, state: &str) -> Result<(), ControlError> {
        let switch: Switch = state.parse()?;
        self.control(appliance, switch).await
    }

    pub fn switch_state(&self, appliance: Appliance) -> Option<Switch> {
        self.output(OutputId::Relay(appliance))
            .map(|o| Switch::from_relay_level(o.state))
    }

    /// `true` when the Feather asks for cooling.
    pub async fn read_signal(&self) -> Result<bool, GpioError> {
        tracing::debug!("Checking fan signal pin...");
        self.backend.read(self.signal_pin).await
    }

    pub fn snapshot(&self) -> BoardState {
        BoardState {
            outputs: self
                .outputs
                .iter()
                .map(|o| OutputState {
                    role: o.role,
                    pin: o.pin,
                    high: o.state,
                    active: o.is_active(),
                })
                .collect(),
            signal_pin: self.signal_pin,
        }
    }

    /// Switch every appliance off, LEDs low, and hand the pins back.
    pub async fn release(&mut self) {
        tracing::info!("Releasing GPIO pins");
        for appliance in Appliance::ALL {
            if let Err(e) = self.control(appliance, Switch::Off).await {
                tracing::warn!("Failed to switch off {}: {}", appliance, e);
            }
        }
        for output in &mut self.outputs {
            if let OutputId::Led(_) = output.role {
                match self.backend.write(output.pin, false).await {
                    Ok(()) => output.state = false,
                    Err(e) => tracing::warn!("Failed to clear LED on pin {}: {}", output.pin, e),
                }
            }
        }
        let pins = self
            .outputs
            .iter()
            .map(|o| o.pin)
            .chain(std::iter::once(self.signal_pin));
        for pin in pins {
            if let Err(e) = self.backend.release(pin).await {
                tracing::warn!("Failed to release GPIO {}: {}", pin, e);
            }
        }
    }
}
