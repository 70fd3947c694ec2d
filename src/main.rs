//! # Force Sensor Bridge
//!
//! Command line front end for a serial force/IMU sensor.
//!
//! Streams readings, sends single commands and exports the CRC lookup
//! tables. Readings go to rotating JSONL telemetry files, or to the log when
//! telemetry is disabled.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use forcesensor_bridge::config::{Config, LoggingConfig};
use forcesensor_bridge::crc::export::export_standard_tables;
use forcesensor_bridge::driver::publish::{LogPublisher, Publisher};
use forcesensor_bridge::driver::{DriverSettings, SensorDriver};
use forcesensor_bridge::frame::protocol::FRAME_LEN;
use forcesensor_bridge::serial::SensorSerial;
use forcesensor_bridge::telemetry::TelemetryLogger;

#[derive(Parser, Debug)]
#[command(name = "forcesensor-bridge")]
#[command(about = "Read a serial force/IMU sensor", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Stream readings until Ctrl+C
    Stream,
    /// Send one command byte and publish the response
    Command {
        /// Command byte, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_byte)]
        byte: u8,
        /// Expected response length in bytes (0-4)
        #[arg(default_value_t = 0)]
        length: usize,
    },
    /// Request and decode a single packet
    ReadPacket,
    /// Write the CRC lookup tables as CSV files
    ExportTables {
        /// Output directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

fn parse_byte(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid command byte '{}': {}", s, e))
}

/// Console logging, plus a daily log file when `[logging] dir` is set
///
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "forcesensor-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path).with_context(|| format!("loading {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let _log_guard = init_logging(&config.logging);

    info!("Force Sensor Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if !cli.config.exists() {
        info!("No configuration file at {}, using defaults", cli.config.display());
    }

    if let Command::ExportTables { dir } = &cli.command {
        let written = export_standard_tables(dir)?;
        info!("Exported {} lookup tables to {}", written.len(), dir.display());
        return Ok(());
    }

    let serial = SensorSerial::open(&config.serial)?;
    info!("Sensor serial port opened at: {}", serial.device_path());

    let mut driver = SensorDriver::new(serial, DriverSettings::from(&config.sensor));
    if let Err(e) = driver.reset().await {
        warn!("Continuing without a clean input buffer: {}", e);
    }

    let mut publisher: Box<dyn Publisher> = if config.telemetry.enabled {
        Box::new(TelemetryLogger::new(&config.telemetry)?)
    } else {
        Box::new(LogPublisher)
    };

    match cli.command {
        Command::Stream => {
            let control = driver.stream_control();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down...");
                    control.stop();
                }
            });

            driver.set_streaming(true).await?;
            info!("Streaming. Press Ctrl+C to exit");

            let result = driver.stream(&mut publisher).await;
            if let Err(e) = driver.set_streaming(false).await {
                warn!("Failed to send stop command: {}", e);
            }

            let stats = result?;
            info!(
                "Published {} readings ({} dropped, {} sync timeouts)",
                stats.published, stats.dropped, stats.sync_timeouts
            );
        }
        Command::Command { byte, length } => {
            driver.dispatch(byte, length, &mut publisher).await?;
        }
        Command::ReadPacket => {
            let command = driver.settings().packet_command;
            driver.dispatch(command, FRAME_LEN, &mut publisher).await?;
        }
        Command::ExportTables { .. } => {}
    }

    Ok(())
}
