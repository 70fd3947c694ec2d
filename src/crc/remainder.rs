//! # Long-Division CRC Check
//!
//! Verifies a checksum by polynomial long division instead of the register
//! algorithm. The payload followed by the `n` checksum bits is treated as
//! one binary number and divided by the generator `x^n + polynomial`; a
//! correct checksum leaves a zero remainder.
//!
//! This works on bit strings of any length, which suits the frame header:
//! the protected value there is 12 bits and does not end on a byte boundary.

use super::engine::{to_byte_list, CrcParams};

/// Remainder of `(payload << n) | checksum` divided by the generator
///
/// Bits are brought down one at a time, MSB first. Whenever the window
/// reaches degree `n` the generator is aligned with that leading one and
/// XORed out, so the window always holds the running remainder. Once the
/// last checksum bit is in, the window is below `2^n`.
pub fn remainder_over_bytes(payload: &[u8], checksum: u32, params: CrcParams) -> u32 {
    let n = params.width();
    let leading_term = 1u64 << n;
    let generator = leading_term | u64::from(params.polynomial());

    let payload_bits = payload
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1));
    let checksum_bits = (0..n).rev().map(|i| ((checksum >> i) & 1) as u8);

    let mut window: u64 = 0;
    for bit in payload_bits.chain(checksum_bits) {
        window = (window << 1) | u64::from(bit);
        if window & leading_term != 0 {
            window ^= generator;
        }
    }

    window as u32
}

/// Check a checksum against a byte payload by long division
///
/// A checksum with bits above `width` never passes.
pub fn check_over_bytes(payload: &[u8], checksum: u32, params: CrcParams) -> bool {
    checksum & !params.mask() == 0 && remainder_over_bytes(payload, checksum, params) == 0
}

/// Check a checksum against an integer payload by long division
///
/// The integer is normalized to its minimal big-endian bytes first; leading
/// zero bits do not affect the remainder.
///
/// # Examples
///
/// ```
/// use forcesensor_bridge::crc::engine::CrcParams;
/// use forcesensor_bridge::crc::remainder::check_over_integer;
///
/// // Init marker 0xAA, sequence counter 5, CRC-4 0x9
/// assert!(check_over_integer(0xAA5, 0x9, CrcParams::CRC4));
/// assert!(!check_over_integer(0xAA5, 0x8, CrcParams::CRC4));
/// ```
pub fn check_over_integer(value: u64, checksum: u32, params: CrcParams) -> bool {
    check_over_bytes(&to_byte_list(value), checksum, params)
}
