// src/hotkeys.rs - Keyboard overrides: key -> pin toggle
use std::collections::BTreeMap;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;

use crate::board::{OutputId, SharedBoard};
use crate::config::ConfigError;
use crate::relay::{Appliance, ControlError};

/// Which output each hotkey toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyTable {
    bindings: BTreeMap<char, OutputId>,
}

impl HotkeyTable {
    /// Build the table from the `[hotkeys]` config section.
    ///
    /// Keys must be single characters and targets must name an existing
    /// output (`led<N>` below `led_count`, or an appliance).
    pub fn from_config(
        entries: &BTreeMap<String, String>,
        led_count: usize,
    ) -> Result<Self, ConfigError> {
        let mut bindings = BTreeMap::new();
        for (key, target) in entries {
            let mut chars = key.chars();
            let key_char = match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_whitespace() => c,
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "hotkey '{}' must be a single character",
                        key
                    )));
                }
            };
            let output: OutputId = target.parse().map_err(|e: ControlError| {
                ConfigError::Invalid(format!("hotkey '{}': {}", key, e))
            })?;
            if let OutputId::Led(index) = output {
                if usize::from(index) >= led_count {
                    return Err(ConfigError::Invalid(format!(
                        "hotkey '{}' targets {} but only {} LEDs are configured",
                        key, output, led_count
                    )));
                }
            }
            bindings.insert(key_char, output);
        }
        Ok(Self { bindings })
    }

    pub fn binding(&self, key: char) -> Option<OutputId> {
        self.bindings.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, OutputId)> + '_ {
        self.bindings.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Applies keystrokes and typed commands to the shared board.
#[derive(Clone)]
pub struct HotkeyHandler {
    board: SharedBoard,
    table: HotkeyTable,
}

impl HotkeyHandler {
    pub fn new(board: SharedBoard, table: HotkeyTable) -> Self {
        Self { board, table }
    }

    pub fn table(&self) -> &HotkeyTable {
        &self.table
    }

    /// Toggle the pin bound to `key`. Returns the new level, or `None` if the
    /// key is unbound.
    pub async fn handle_key(&self, key: char) -> Result<Option<bool>, ControlError> {
        let Some(output) = self.table.binding(key) else {
            tracing::debug!("No hotkey bound to '{}'", key);
            return Ok(None);
        };
        tracing::debug!("Keyboard input received!");
        let level = self.board.lock().await.toggle(output).await?;
        Ok(Some(level))
    }

    /// `<appliance> <on|off>`, e.g. `fan on`.
    pub async fn handle_command(&self, line: &str) -> Result<(), ControlError> {
        let mut words = line.split_whitespace();
        let (Some(name), Some(state), None) = (words.next(), words.next(), words.next()) else {
            return Err(ControlError::UnknownOutput(line.trim().to_string()));
        };
        let appliance: Appliance = name.parse()?;
        self.board.lock().await.control_str(appliance, state).await
    }

    /// A line starting with an appliance name is a command; otherwise every
    /// non-whitespace character is a keypress.
    pub async fn handle_line(&self, line: &str) {
        let trimmed = line.trim();
        let Some(first) = trimmed.split_whitespace().next() else {
            return;
        };
        if first.parse::<Appliance>().is_ok() {
            match self.handle_command(trimmed).await {
                Ok(()) => {}
                Err(e @ (ControlError::InvalidState(_) | ControlError::UnknownOutput(_))) => {
                    tracing::warn!("Ignoring '{}': {}", trimmed, e);
                }
                Err(e) => tracing::error!("Command '{}' failed: {}", trimmed, e),
            }
            return;
        }
        for key in trimmed.chars().filter(|c| !c.is_whitespace()) {
            if let Err(e) = self.handle_key(key).await {
                tracing::error!("Hotkey '{}' failed: {}", key, e);
            }
        }
    }

    /// Read input until EOF or shutdown.
    pub async fn run<R>(&self, reader: R, mut shutdown_rx: broadcast::Receiver<()>)
    where
        R: AsyncRead + Unpin,
    {
        tracing::debug!("Waiting on keyboard input...");
        let mut lines = BufReader::new(reader).lines();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::debug!("Keyboard handler shutting down");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line).await,
                    Ok(None) => {
                        tracing::debug!("Keyboard input closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read keyboard input: {}", e);
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::config::{Config, PinConfig};
    use crate::gpio::SimulatedGpio;
    use std::sync::Arc;

    async fn handler() -> (Arc<SimulatedGpio>, HotkeyHandler) {
        let gpio = Arc::new(SimulatedGpio::new());
        let board = Board::init(&PinConfig::default(), gpio.clone())
            .await
            .unwrap()
            .into_shared();
        let config = Config::default();
        let table = HotkeyTable::from_config(&config.hotkeys, config.pins.leds.len()).unwrap();
        (gpio, HotkeyHandler::new(board, table))
    }

    #[test]
    fn test_default_table() {
        let config = Config::default();
        let table = HotkeyTable::from_config(&config.hotkeys, 3).unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(table.binding('0'), Some(OutputId::Led(0)));
        assert_eq!(table.binding('2'), Some(OutputId::Led(2)));
        assert_eq!(table.binding('3'), Some(OutputId::Relay(Appliance::Fan)));
        assert_eq!(table.binding('4'), Some(OutputId::Relay(Appliance::Mister)));
        assert_eq!(table.binding('5'), Some(OutputId::Relay(Appliance::Light)));
        assert_eq!(table.binding('6'), Some(OutputId::Relay(Appliance::WaterPump)));
        assert_eq!(table.binding('7'), None);
    }

    #[test]
    fn test_led_binding_out_of_range() {
        let mut entries = BTreeMap::new();
        entries.insert("9".to_string(), "led2".to_string());
        assert!(HotkeyTable::from_config(&entries, 2).is_err());
        assert!(HotkeyTable::from_config(&entries, 3).is_ok());
    }

    #[test]
    fn test_multi_char_key_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert("ab".to_string(), "fan".to_string());
        assert!(matches!(
            HotkeyTable::from_config(&entries, 3),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_key_toggles_bound_pin() {
        let (gpio, handler) = handler().await;
        assert_eq!(handler.handle_key('0').await.unwrap(), Some(true));
        assert_eq!(gpio.level(17), Some(true));
        assert_eq!(handler.handle_key('0').await.unwrap(), Some(false));
        assert_eq!(gpio.level(17), Some(false));

        // Relays start high, so the first press energizes the pump
        assert_eq!(handler.handle_key('6').await.unwrap(), Some(false));
        assert_eq!(gpio.level(26), Some(false));
    }

    #[tokio::test]
    async fn test_unbound_key_is_ignored() {
        let (gpio, handler) = handler().await;
        gpio.clear_writes();
        assert_eq!(handler.handle_key('x').await.unwrap(), None);
        assert!(gpio.writes().is_empty());
    }

    #[tokio::test]
    async fn test_commands() {
        let (gpio, handler) = handler().await;
        handler.handle_command("light ON").await.unwrap();
        assert_eq!(gpio.level(25), Some(false));
        handler.handle_command("light off").await.unwrap();
        assert_eq!(gpio.level(25), Some(true));

        gpio.clear_writes();
        assert!(matches!(
            handler.handle_command("fan maybe").await,
            Err(ControlError::InvalidState(_))
        ));
        assert!(matches!(
            handler.handle_command("heater on").await,
            Err(ControlError::UnknownOutput(_))
        ));
        assert!(gpio.writes().is_empty());
    }

    #[tokio::test]
    async fn test_spaced_keys_are_separate_presses() {
        let (gpio, handler) = handler().await;
        handler.handle_line("3 4").await;
        assert_eq!(gpio.level(23), Some(false));
        assert_eq!(gpio.level(24), Some(false));

        handler.handle_line("  0\t1 ").await;
        assert_eq!(gpio.level(17), Some(true));
        assert_eq!(gpio.level(27), Some(true));
    }

    #[tokio::test]
    async fn test_line_is_command_only_after_appliance_name() {
        let (gpio, handler) = handler().await;
        handler.handle_line("Pump on").await;
        assert_eq!(gpio.level(26), Some(false));

        // Not an appliance, so "5" and "2" are keypresses
        handler.handle_line("5 2").await;
        assert_eq!(gpio.level(25), Some(false));
        assert_eq!(gpio.level(22), Some(true));

        gpio.clear_writes();
        handler.handle_line("fan sideways").await;
        handler.handle_line("   ").await;
        assert!(gpio.writes().is_empty());
    }

    #[tokio::test]
    async fn test_run_reads_keys_and_commands() {
        let (gpio, handler) = handler().await;
        let input = tokio_test::io::Builder::new()
            .read(b"3\n")
            .read(b"1 2\n")
            .read(b"mister on\n")
            .read(b"pump sideways\n")
            .build();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        handler.run(input, shutdown_rx).await;

        assert_eq!(gpio.level(23), Some(false));
        assert_eq!(gpio.level(27), Some(true));
        assert_eq!(gpio.level(22), Some(true));
        assert_eq!(gpio.level(24), Some(false));
        assert_eq!(gpio.level(26), Some(true));
    }
}
