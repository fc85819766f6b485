// src/main.rs - Paludarium controller entry point
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use paludarium_rs::config::{self, BackendType, Config};
use paludarium_rs::{GpioBackend, Paludarium, SimulatedGpio, SysfsGpio};

const DEFAULT_CONFIG_PATH: &str = "paludarium.toml";

#[derive(Debug, Parser)]
#[command(name = "paludarium", version, about = "Relay, LED and hotkey controller for a paludarium")]
struct Cli {
    /// TOML configuration file
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Use in-memory GPIO instead of sysfs
    #[arg(long)]
    simulate: bool,

    /// Start the simulated thermal signal high
    #[arg(long, requires = "simulate")]
    signal_high: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "debug")]
    log_level: tracing::Level,
}

fn load(path: &str) -> Result<Config, config::ConfigError> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        tracing::warn!("No {} found, using built-in defaults", path);
        return Ok(Config::default());
    }
    tracing::info!("Loading configuration from: {}", path);
    config::load_config(path)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    tracing::info!("Starting paludarium controller {}", env!("CARGO_PKG_VERSION"));

    let config = load(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let backend: Arc<dyn GpioBackend> = if cli.simulate || config.gpio.backend == BackendType::Simulated {
        tracing::info!("Using simulated GPIO");
        let gpio = SimulatedGpio::new();
        gpio.set_input(config.pins.signal, cli.signal_high);
        Arc::new(gpio)
    } else {
        tracing::info!("Using sysfs GPIO at {}", config.gpio.sysfs_root.display());
        Arc::new(SysfsGpio::new(config.gpio.sysfs_root.clone()))
    };

    let mut paludarium = match Paludarium::new(config, backend).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to initialize paludarium: {}", e);
            return Err(e.into());
        }
    };

    for (key, output) in paludarium.hotkeys().table().iter() {
        tracing::info!("Hotkey '{}' toggles {}", key, output);
    }

    paludarium.start();

    let hotkeys = paludarium.hotkeys();
    let keyboard = hotkeys.run(tokio::io::stdin(), paludarium.subscribe_shutdown());
    tokio::pin!(keyboard);

    tokio::select! {
        _ = &mut keyboard => {
            tracing::info!("Keyboard closed; running until Ctrl-C");
            tokio::signal::ctrl_c().await?;
        }
        res = tokio::signal::ctrl_c() => res?,
    }

    paludarium.shutdown().await?;
    tracing::info!("Paludarium controller stopped");

    // The blocking stdin reader would otherwise hold runtime teardown until the next line.
    std::process::exit(0);
}
