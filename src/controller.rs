// src/controller.rs - The assembled paludarium controller
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::board::{Board, BoardState, SharedBoard};
use crate::config::{Config, ConfigError};
use crate::gpio::{GpioBackend, GpioError};
use crate::hotkeys::{HotkeyHandler, HotkeyTable};
use crate::monitor::SignalMonitor;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
    #[error("Signal monitor task failed: {0}")]
    Monitor(#[from] tokio::task::JoinError),
}

pub struct Paludarium {
    config: Config,
    board: SharedBoard,
    hotkeys: HotkeyTable,
    shutdown_tx: broadcast::Sender<()>,
    monitor: Option<JoinHandle<()>>,
}

impl Paludarium {
    /// Validate the config and claim every pin. Nothing runs until [`Paludarium::start`].
    pub async fn new(config: Config, backend: Arc<dyn GpioBackend>) -> Result<Self, ControllerError> {
        config.validate()?;
        let hotkeys = HotkeyTable::from_config(&config.hotkeys, config.pins.leds.len())?;
        let board = Board::init(&config.pins, backend).await?.into_shared();
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            board,
            hotkeys,
            shutdown_tx,
            monitor: None,
        })
    }

    /// Spawn the signal monitor. Calling it again while running is a no-op.
    pub fn start(&mut self) {
        if self.monitor.is_some() {
            tracing::warn!("Signal monitor already running");
            return;
        }
        tracing::debug!("Starting up fan monitor task...");
        let monitor = SignalMonitor::new(self.board.clone(), self.config.timing.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();
        self.monitor = Some(tokio::spawn(monitor.run(shutdown_rx)));
    }

    pub fn is_running(&self) -> bool {
        self.monitor.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn hotkeys(&self) -> HotkeyHandler {
        HotkeyHandler::new(self.board.clone(), self.hotkeys.clone())
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn board(&self) -> SharedBoard {
        self.board.clone()
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub async fn state(&self) -> BoardState {
        self.board.lock().await.snapshot()
    }

    /// Stop the monitor (cancelling its pending timers), switch everything off
    /// and release the pins.
    pub async fn shutdown(&mut self) -> Result<(), ControllerError> {
        tracing::info!("Shutting down paludarium controller");
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.monitor.take() {
            task.await?;
        }
        self.board.lock().await.release().await;
        Ok(())
    }
}
