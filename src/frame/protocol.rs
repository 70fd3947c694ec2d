//! # Sensor Protocol Constants and Types
//!
//! Wire layout of the sensor stream:
//!
//! ```text
//! ┌──────────┬──────────────────┬──────────────────────┬──────────────┐
//! │ 0xAA     │ seq (4) │ crc4 (4)│ payload (47 bytes)   │ CRC-32 (LE)  │
//! │ init     │ header           │ SH-2 sensor record   │ bytes 47..51 │
//! └──────────┴──────────────────┴──────────────────────┴──────────────┘
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::{ForceSensorError, Result};

/// Init marker preceding every frame header
pub const INIT_MARKER: u8 = 0xAA;

/// Frame body length following the header (payload + CRC-32)
pub const FRAME_LEN: usize = 51;

/// Bytes covered by the payload CRC-32
pub const PAYLOAD_LEN: usize = 47;

/// Number of differential and sum channels
pub const NUM_CHANNELS: usize = 6;

/// Offset of the first differential channel
pub const DIFFERENTIAL_OFFSET: usize = 0;

/// Offset of the first sum channel
pub const SUM_OFFSET: usize = 18;

/// Report ID byte
pub const REPORT_ID_OFFSET: usize = 37;

/// Sequence number byte
pub const SEQUENCE_OFFSET: usize = 38;

/// Status byte (delay extension bits 7..2, accuracy bits 1..0)
pub const STATUS_OFFSET: usize = 39;

/// Delay low byte
pub const DELAY_OFFSET: usize = 40;

/// First of three little-endian 16-bit IMU values
pub const IMU_OFFSET: usize = 41;

/// Little-endian CRC-32 trailer
pub const CHECKSUM_OFFSET: usize = 47;

/// Delay resolution in seconds (100 µs)
pub const DELAY_UNIT_SECONDS: f64 = 100e-6;

/// Command: read a single packet
pub const CMD_READ_PACKET: u8 = 0x12;

/// Command: start continuous streaming
pub const CMD_START_STREAM: u8 = 0x10;

/// Command: stop continuous streaming
pub const CMD_STOP_STREAM: u8 = 0x11;

/// 24-bit channel readings
pub type Channels = [i32; NUM_CHANNELS];

/// Frame header: 4-bit sequence counter and 4-bit CRC-4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sequence_counter: u8,
    pub header_crc: u8,
}

impl FrameHeader {
    /// Split a header byte into counter (upper nibble) and checksum (lower nibble)
    pub fn from_byte(byte: u8) -> Self {
        Self {
            sequence_counter: byte >> 4,
            header_crc: byte & 0x0F,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.sequence_counter << 4) | (self.header_crc & 0x0F)
    }

    /// Value protected by the header CRC: `INIT_MARKER << 4 | counter`
    pub fn protected_value(&self) -> u64 {
        (u64::from(INIT_MARKER) << 4) | u64::from(self.sequence_counter & 0x0F)
    }
}

/// SH-2 report type carried in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportId {
    Accelerometer,
    Gyroscope,
    #[serde(rename = "Linear Acceleration")]
    LinearAcceleration,
    #[serde(rename = "Rotation Vector")]
    RotationVector,
    #[serde(rename = "Game Rotation Vector")]
    GameRotationVector,
}

impl ReportId {
    pub fn code(self) -> u8 {
        match self {
            ReportId::Accelerometer => 0x01,
            ReportId::Gyroscope => 0x02,
            ReportId::LinearAcceleration => 0x04,
            ReportId::RotationVector => 0x05,
            ReportId::GameRotationVector => 0x08,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportId::Accelerometer => "Accelerometer",
            ReportId::Gyroscope => "Gyroscope",
            ReportId::LinearAcceleration => "Linear Acceleration",
            ReportId::RotationVector => "Rotation Vector",
            ReportId::GameRotationVector => "Game Rotation Vector",
        }
    }
}

impl TryFrom<u8> for ReportId {
    type Error = ForceSensorError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(ReportId::Accelerometer),
            0x02 => Ok(ReportId::Gyroscope),
            0x04 => Ok(ReportId::LinearAcceleration),
            0x05 => Ok(ReportId::RotationVector),
            0x08 => Ok(ReportId::GameRotationVector),
            other => Err(ForceSensorError::UnknownReportId(other)),
        }
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reading accuracy from the two low status bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Accuracy {
    Unreliable = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Accuracy {
    pub fn from_status(status: u8) -> Self {
        match status & 0x03 {
            0 => Accuracy::Unreliable,
            1 => Accuracy::Low,
            2 => Accuracy::Medium,
            _ => Accuracy::High,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One decoded sensor frame
///
/// Built once per validated frame and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorPacket {
    /// Differential channels (signed 24-bit)
    pub differential: Channels,

    /// Sum channels (signed 24-bit)
    pub sum: Channels,

    pub report_id: ReportId,

    pub sequence_num: u8,

    pub accuracy: Accuracy,

    /// Report delay in seconds
    pub delay: f64,

    /// IMU (x, y, z)
    pub imu: [i16; 3],

    /// CRC-32 trailer as received
    pub checksum: u32,

    /// Which physical sensor produced the frame (not on the wire)
    pub sensor_num: u8,
}
