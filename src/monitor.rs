// src/monitor.rs - Thermal signal polling and the cool-down sequence
use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};

use crate::board::SharedBoard;
use crate::config::TimingConfig;
use crate::relay::{Appliance, ControlError, Switch};

/// One-shot "switch this appliance off later" tasks, at most one per appliance.
///
/// Scheduling a reversion for an appliance that already has one pending
/// replaces it, so the latest cooling cycle owns the timer.
#[derive(Debug, Default)]
pub struct Reversions {
    pending: HashMap<Appliance, JoinHandle<()>>,
}

impl Reversions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, board: SharedBoard, appliance: Appliance, delay: Duration) {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let mut board = board.lock().await;
            if let Err(e) = board.control(appliance, Switch::Off).await {
                tracing::error!("Timed switch-off of {} failed: {}", appliance, e);
            }
        });
        if let Some(previous) = self.pending.insert(appliance, handle) {
            if !previous.is_finished() {
                tracing::debug!("Replacing pending {} timer", appliance);
            }
            previous.abort();
        }
    }

    /// Appliances with a reversion that has not fired yet.
    pub fn pending(&self) -> Vec<Appliance> {
        let mut pending: Vec<Appliance> = self
            .pending
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(appliance, _)| *appliance)
            .collect();
        pending.sort();
        pending
    }

    pub fn abort_all(&mut self) {
        for (appliance, handle) in self.pending.drain() {
            if !handle.is_finished() {
                tracing::debug!("Cancelling pending {} timer", appliance);
            }
            handle.abort();
        }
    }
}

impl Drop for Reversions {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// Polls the Feather's signal pin and drives the cooling relays.
pub struct SignalMonitor {
    board: SharedBoard,
    timing: TimingConfig,
    reversions: Reversions,
}

impl SignalMonitor {
    pub fn new(board: SharedBoard, timing: TimingConfig) -> Self {
        Self {
            board,
            timing,
            reversions: Reversions::new(),
        }
    }

    pub fn reversions(&self) -> &Reversions {
        &self.reversions
    }

    /// Poll until `shutdown_rx` fires. The first check happens immediately.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!("Handling fan signals...");
        let mut interval = tokio::time::interval(self.timing.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Signal monitor shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.check_signal().await {
                        tracing::error!("Signal monitor error: {}", e);
                    }
                    tracing::debug!("Going to sleep...");
                }
            }
        }
        self.reversions.abort_all();
    }

    /// One poll: cool down when the signal is high, otherwise stop the fan.
    pub async fn check_signal(&mut self) -> Result<(), ControlError> {
        let signal = self.board.lock().await.read_signal().await?;
        if signal {
            self.cool_down().await
        } else {
            tracing::info!("Turning OFF relay one...");
            self.board.lock().await.control(Appliance::Fan, Switch::Off).await
        }
    }

    /// Fan on, light off, then pulse the pump and the mister.
    ///
    /// The board lock is taken per step, so hotkeys still work during the
    /// step delays.
    pub async fn cool_down(&mut self) -> Result<(), ControlError> {
        let step_delay = self.timing.step_delay();

        tracing::info!("Turning fan on to cool down tank...");
        self.board.lock().await.control(Appliance::Fan, Switch::On).await?;
        sleep(step_delay).await;

        tracing::info!("Turning light off to help cool down tank...");
        self.board.lock().await.control(Appliance::Light, Switch::Off).await?;
        sleep(step_delay).await;

        tracing::info!("Turning water pump on so fogger has water in the top reservoir...");
        self.board.lock().await.control(Appliance::WaterPump, Switch::On).await?;
        let water = self.timing.water_duration();
        tracing::info!("Starting timer to turn off water in {:?}...", water);
        self.reversions
            .schedule(self.board.clone(), Appliance::WaterPump, water);

        tracing::info!("Turning fogger on...");
        self.board.lock().await.control(Appliance::Mister, Switch::On).await?;
        let mist = self.timing.mist_duration();
        tracing::info!("Starting timer to turn fogger off in {:?}...", mist);
        self.reversions
            .schedule(self.board.clone(), Appliance::Mister, mist);

        Ok(())
    }
}
