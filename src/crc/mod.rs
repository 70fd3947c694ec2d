//! # CRC Module
//!
//! Checksums protecting the sensor byte stream.
//!
//! This module handles:
//! - Bitwise and table-driven CRC for 4-, 8- and 32-bit widths
//! - Compile-time lookup table generation
//! - Long-division remainder checks for non byte-aligned values
//! - Lookup table export as delimited text

pub mod engine;
pub mod export;
pub mod remainder;
