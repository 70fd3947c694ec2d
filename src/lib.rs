//! # Force Sensor Bridge Library
//!
//! Read a serial force/IMU sensor: locate frames in the raw byte stream,
//! validate them with CRC-4 and CRC-32 checksums and decode the packed
//! payload into structured readings.
//!
//! This library provides the CRC engine, the frame synchronizer and decoder,
//! the command/response driver and the publishers that deliver readings.

pub mod config;
pub mod crc;
pub mod driver;
pub mod error;
pub mod frame;
pub mod serial;
pub mod telemetry;
