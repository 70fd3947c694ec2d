//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ForceSensorError, Result};
use crate::frame::protocol::{CMD_READ_PACKET, CMD_START_STREAM, CMD_STOP_STREAM};
use crate::frame::sync::DEFAULT_MAX_SCAN;
use crate::serial::{DEFAULT_DEVICE_PATHS, SENSOR_BAUD_RATE};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Tried in order when `port` cannot be opened
    #[serde(default = "default_fallback_ports")]
    pub fallback_ports: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on a single read
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Sensor protocol configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    /// Identifies this sensor in published readings
    #[serde(default)]
    pub sensor_num: u8,

    /// Retry ceiling for packet reads and response polling
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Byte reads per synchronization attempt
    #[serde(default = "default_max_scan")]
    pub max_scan: usize,

    /// Pause between response-length polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_packet_command")]
    pub packet_command: u8,

    #[serde(default = "default_start_stream_command")]
    pub start_stream_command: u8,

    #[serde(default = "default_stop_stream_command")]
    pub stop_stream_command: u8,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Application log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Also write daily-rolling log files here when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

// Default value functions
fn default_serial_port() -> String { DEFAULT_DEVICE_PATHS[0].to_string() }
fn default_fallback_ports() -> Vec<String> { DEFAULT_DEVICE_PATHS[1..].iter().map(|p| p.to_string()).collect() }
fn default_baud_rate() -> u32 { SENSOR_BAUD_RATE }
fn default_timeout_ms() -> u64 { 16 }

fn default_max_attempts() -> usize { 100 }
fn default_max_scan() -> usize { DEFAULT_MAX_SCAN }
fn default_poll_interval_ms() -> u64 { 1 }
fn default_packet_command() -> u8 { CMD_READ_PACKET }
fn default_start_stream_command() -> u8 { CMD_START_STREAM }
fn default_stop_stream_command() -> u8 { CMD_STOP_STREAM }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            fallback_ports: default_fallback_ports(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sensor_num: 0,
            max_attempts: default_max_attempts(),
            max_scan: default_max_scan(),
            poll_interval_ms: default_poll_interval_ms(),
            packet_command: default_packet_command(),
            start_stream_command: default_start_stream_command(),
            stop_stream_command: default_stop_stream_command(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> ForceSensorError {
    ForceSensorError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use forcesensor_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if self.serial.fallback_ports.iter().any(String::is_empty) {
            return Err(invalid("fallback_ports cannot contain empty paths"));
        }

        if self.serial.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than 0"));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.sensor.max_attempts == 0 || self.sensor.max_attempts > 100_000 {
            return Err(invalid("max_attempts must be between 1 and 100000"));
        }

        if self.sensor.max_scan == 0 || self.sensor.max_scan > 100_000 {
            return Err(invalid("max_scan must be between 1 and 100000"));
        }

        if self.sensor.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be at most 1000"));
        }

        let commands = [
            ("packet_command", self.sensor.packet_command),
            ("start_stream_command", self.sensor.start_stream_command),
            ("stop_stream_command", self.sensor.stop_stream_command),
        ];
        for (i, (name, code)) in commands.iter().enumerate() {
            if commands[i + 1..].iter().any(|(_, other)| other == code) {
                return Err(invalid(format!("{} 0x{:02X} is used by another command", name, code)));
            }
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}
