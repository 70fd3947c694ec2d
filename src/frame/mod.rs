//! # Sensor Frame Module
//!
//! Framing and decoding of the sensor's binary stream.
//!
//! This module handles:
//! - Frame synchronization on the init marker and CRC-4 header
//! - CRC-32 validation of the frame body
//! - Decoding the SH-2 payload into sensor readings
//! - Encoding frames for simulated devices

pub mod decoder;
pub mod encoder;
pub mod protocol;
pub mod sync;
