//! # Serial Communication Module
//!
//! Handles the serial link to the force sensor.
//!
//! This module handles:
//! - Opening the sensor's USB serial port (8N1, 5 Mbaud by default)
//! - Falling back through alternative device paths
//! - Bounded reads that return early on timeout
//! - Purging input and reporting queued byte counts

pub mod port_trait;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{ForceSensorError, Result};
pub use port_trait::{ByteSource, TokioSerialPort};

/// Default sensor baud rate (5 Mbaud)
pub const SENSOR_BAUD_RATE: u32 = 5_000_000;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &["/dev/ttyUSB0", "/dev/ttyUSB1"];

/// Sensor Serial Port Handler
///
/// Owns the connection to one sensor. Only one reader may use it at a time.
pub struct SensorSerial {
    port: TokioSerialPort,
    device_path: String,
}

impl std::fmt::Debug for SensorSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SensorSerial {
    /// Open the configured port, then each fallback port in order
    ///
    /// # Errors
    ///
    /// Returns [`ForceSensorError::SerialPortNotFound`] if no path opens
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let paths: Vec<&str> = std::iter::once(config.port.as_str())
            .chain(config.fallback_ports.iter().map(String::as_str))
            .collect();

        Self::open_with_paths(
            &paths,
            config.baud_rate,
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Open a connection with custom device paths
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Line rate
    /// * `read_timeout` - Upper bound on a single `read`
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(stream) => {
                    info!("Opened sensor at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port: TokioSerialPort::new(stream, read_timeout),
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(ForceSensorError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        use tokio_serial::SerialPortBuilderExt;

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| ForceSensorError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Path of the device that was opened
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl ByteSource for SensorSerial {
    async fn read(&mut self, n: usize) -> io::Result<Bytes> {
        self.port.read(n).await
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write(data).await
    }

    async fn purge(&mut self) -> io::Result<()> {
        self.port.purge().await
    }

    async fn available(&mut self) -> io::Result<usize> {
        self.port.available().await
    }
}
