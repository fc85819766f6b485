//! # Paludarium Configuration
//!
//! Pin assignments, cooling-cycle timings and hotkey bindings, loaded from a
//! TOML file. Every field has a default matching the stock wiring, so an empty
//! file (or no file at all) yields a working controller.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [pins]
//! leds = [17, 27, 22]
//! fan = 23
//! mister = 24
//! light = 25
//! pump = 26
//! signal = 5
//!
//! [timing]
//! poll_interval = 300.0
//! step_delay = 1.0
//! water_duration = 10.0
//! mist_duration = 270.0
//!
//! [hotkeys]
//! 0 = "led0"
//! 3 = "fan"
//! ```
//!
//! Timings are in seconds. A `[hotkeys]` table replaces the default bindings
//! as a whole.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::hotkeys::HotkeyTable;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for pins, timings, hotkeys and the GPIO backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default = "default_hotkeys")]
    pub hotkeys: BTreeMap<String, String>,
    #[serde(default)]
    pub gpio: GpioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pins: PinConfig::default(),
            timing: TimingConfig::default(),
            hotkeys: default_hotkeys(),
            gpio: GpioConfig::default(),
        }
    }
}

/// BCM pin numbers of every output and of the thermal signal input.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinConfig {
    /// Status LEDs. LED 0 also tells the Feather to switch the LED strip.
    #[serde(default = "default_leds")]
    pub leds: Vec<u32>,
    #[serde(default = "default_fan")]
    pub fan: u32,
    #[serde(default = "default_mister")]
    pub mister: u32,
    #[serde(default = "default_light")]
    pub light: u32,
    #[serde(default = "default_pump")]
    pub pump: u32,
    /// Input driven high by the Feather when the tank needs cooling.
    #[serde(default = "default_signal")]
    pub signal: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            leds: default_leds(),
            fan: default_fan(),
            mister: default_mister(),
            light: default_light(),
            pump: default_pump(),
            signal: default_signal(),
        }
    }
}

/// Cooling-cycle timings, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    #[serde(default = "default_step_delay")]
    pub step_delay: f64,
    #[serde(default = "default_water_duration")]
    pub water_duration: f64,
    #[serde(default = "default_mist_duration")]
    pub mist_duration: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            step_delay: default_step_delay(),
            water_duration: default_water_duration(),
            mist_duration: default_mist_duration(),
        }
    }
}

impl TimingConfig {
    /// Every timing must convert to a `Duration`; all but `step_delay` must
    /// also be non-zero once converted. The accessors below rely on this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timings = [
            ("poll_interval", self.poll_interval, false),
            ("step_delay", self.step_delay, true),
            ("water_duration", self.water_duration, false),
            ("mist_duration", self.mist_duration, false),
        ];
        for (name, value, zero_ok) in timings {
            let duration = Duration::try_from_secs_f64(value).map_err(|e| {
                ConfigError::Invalid(format!("timing.{} = {}: {}", name, value, e))
            })?;
            if duration.is_zero() && !zero_ok {
                return Err(ConfigError::Invalid(format!(
                    "timing.{} must be > 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_secs_f64(self.step_delay)
    }

    pub fn water_duration(&self) -> Duration {
        Duration::from_secs_f64(self.water_duration)
    }

    pub fn mist_duration(&self) -> Duration {
        Duration::from_secs_f64(self.mist_duration)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Sysfs,
    Simulated,
}

/// Which GPIO implementation drives the pins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpioConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendType,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

impl Config {
    /// Validate pins, timings and hotkey bindings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let pins = self
            .pins
            .leds
            .iter()
            .copied()
            .chain([
                self.pins.fan,
                self.pins.mister,
                self.pins.light,
                self.pins.pump,
                self.pins.signal,
            ]);
        for pin in pins {
            if !seen.insert(pin) {
                return Err(ConfigError::Invalid(format!(
                    "GPIO {} is assigned more than once",
                    pin
                )));
            }
        }

        if self.pins.leds.len() > MAX_LEDS {
            return Err(ConfigError::Invalid(format!(
                "at most {} LEDs are supported, got {}",
                MAX_LEDS,
                self.pins.leds.len()
            )));
        }

        self.timing.validate()?;
        HotkeyTable::from_config(&self.hotkeys, self.pins.leds.len())?;
        Ok(())
    }
}

/// LED roles are indexed by `u8`.
pub const MAX_LEDS: usize = u8::MAX as usize + 1;

// Default value functions
fn default_leds() -> Vec<u32> { vec![17, 27, 22] }
fn default_fan() -> u32 { 23 }
fn default_mister() -> u32 { 24 }
fn default_light() -> u32 { 25 }
fn default_pump() -> u32 { 26 }
fn default_signal() -> u32 { 5 }
fn default_poll_interval() -> f64 { 300.0 }
fn default_step_delay() -> f64 { 1.0 }
fn default_water_duration() -> f64 { 10.0 }
fn default_mist_duration() -> f64 { 270.0 }
fn default_backend() -> BackendType { BackendType::Sysfs }
fn default_sysfs_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }

fn default_hotkeys() -> BTreeMap<String, String> {
    [
        ("0", "led0"),
        ("1", "led1"),
        ("2", "led2"),
        ("3", "fan"),
        ("4", "mister"),
        ("5", "light"),
        ("6", "pump"),
    ]
    .into_iter()
    .map(|(key, target)| (key.to_string(), target.to_string()))
    .collect()
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("paludarium.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        let path = file_path.to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.pins.leds, vec![17, 27, 22]);
        assert_eq!(config.pins.fan, 23);
        assert_eq!(config.pins.mister, 24);
        assert_eq!(config.pins.light, 25);
        assert_eq!(config.pins.pump, 26);
        assert_eq!(config.pins.signal, 5);
        assert_eq!(config.timing.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.timing.step_delay(), Duration::from_secs(1));
        assert_eq!(config.timing.water_duration(), Duration::from_secs(10));
        assert_eq!(config.timing.mist_duration(), Duration::from_secs(270));
        assert_eq!(config.hotkeys.len(), 7);
        assert_eq!(config.hotkeys["6"], "pump");
        assert_eq!(config.gpio.backend, BackendType::Sysfs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let (_dir, path) = write_config(
            "[pins]\nfan = 12\n\n[timing]\nmist_duration = 60.0\n\n[gpio]\nbackend = 'simulated'",
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.pins.fan, 12);
        assert_eq!(config.timing.mist_duration, 60.0);
        assert_eq!(config.gpio.backend, BackendType::Simulated);
        // Defaults for missing fields
        assert_eq!(config.pins.light, 25);
        assert_eq!(config.timing.water_duration, 10.0);
        assert_eq!(config.hotkeys["3"], "fan");
    }

    #[test]
    fn test_hotkeys_table_replaces_defaults() {
        let (_dir, path) = write_config("[hotkeys]\nf = 'fan'\nl = 'light'");
        let config = load_config(&path).unwrap();
        assert_eq!(config.hotkeys.len(), 2);
        assert_eq!(config.hotkeys["f"], "fan");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_file.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let (_dir, path) = write_config("not a valid toml");
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let (_dir, path) = write_config("[pins]\nfan = 5");
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("GPIO 5")));
    }

    #[test]
    fn test_non_positive_timings_rejected() {
        let mut config = Config::default();
        config.timing.poll_interval = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.timing.step_delay = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.timing.step_delay = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timings_that_round_to_zero_rejected() {
        let mut config = Config::default();
        config.timing.poll_interval = 1e-12;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("poll_interval")));

        let mut config = Config::default();
        config.timing.water_duration = 1e-12;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        // A sub-nanosecond step delay is just no delay
        let mut config = Config::default();
        config.timing.step_delay = 1e-12;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timings_too_large_for_duration_rejected() {
        let mut config = Config::default();
        config.timing.mist_duration = 1e30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("mist_duration")));

        let mut config = Config::default();
        config.timing.step_delay = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.timing.poll_interval = f64::INFINITY;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_tiny_poll_interval_rejected_at_load() {
        let (_dir, path) = write_config("[timing]\npoll_interval = 1e-12");
        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_led_count_capped() {
        let mut config = Config::default();
        config.pins.leds = (1000..1000 + MAX_LEDS as u32 + 1).collect();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("LEDs")));

        config.pins.leds.pop();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_hotkeys_rejected() {
        let mut config = Config::default();
        config.hotkeys.insert("10".to_string(), "fan".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.hotkeys.insert("7".to_string(), "heater".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.hotkeys.insert("7".to_string(), "led3".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
