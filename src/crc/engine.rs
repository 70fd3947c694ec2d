//! # Generic CRC Engine
//!
//! MSB-first CRC for widths 4, 8 and 32, with a zero initial value, no
//! input/output reflection and no final XOR.
//!
//! Widths below 8 run in an 8-bit working register: the polynomial is
//! shifted into the upper bits before the bit loop and the register is
//! shifted back down once all bytes are processed.

use std::ops::Index;

use crate::error::{ForceSensorError, Result};

/// Register widths this engine supports
pub const SUPPORTED_WIDTHS: [u32; 3] = [4, 8, 32];

/// CRC width and polynomial
///
/// The polynomial is written without its implicit leading `x^width` term,
/// so CRC-4 `0x9` is the generator `x^4 + x^3 + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcParams {
    width: u32,
    polynomial: u32,
}

impl CrcParams {
    /// CRC-4 protecting the frame header
    pub const CRC4: CrcParams = CrcParams { width: 4, polynomial: 0x9 };

    /// CRC-8 (x^8 + x^2 + x + 1)
    pub const CRC8: CrcParams = CrcParams { width: 8, polynomial: 0x07 };

    /// CRC-32 protecting the sensor payload
    pub const CRC32: CrcParams = CrcParams { width: 32, polynomial: 0x04C1_1DB7 };

    /// Create validated CRC parameters
    ///
    /// # Errors
    ///
    /// Returns [`ForceSensorError::InvalidCrcParams`] if the width is not one
    /// of [`SUPPORTED_WIDTHS`] or the polynomial does not fit in `width` bits.
    pub fn new(width: u32, polynomial: u32) -> Result<Self> {
        if !SUPPORTED_WIDTHS.contains(&width) {
            return Err(ForceSensorError::InvalidCrcParams(format!(
                "unsupported width {} (supported: {:?})",
                width, SUPPORTED_WIDTHS
            )));
        }

        let poly_bits = u32::BITS - polynomial.leading_zeros();
        if poly_bits > width {
            return Err(ForceSensorError::InvalidCrcParams(format!(
                "polynomial 0x{:X} needs {} bits, width is {}",
                polynomial, poly_bits, width
            )));
        }

        Ok(Self { width, polynomial })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn polynomial(&self) -> u32 {
        self.polynomial
    }

    /// Mask selecting the low `width` bits
    pub const fn mask(&self) -> u32 {
        low_mask(self.width)
    }

    const fn register_width(&self) -> u32 {
        if self.width < 8 {
            8
        } else {
            self.width
        }
    }

    /// Distance between the CRC and the top of the working register
    const fn register_shift(&self) -> u32 {
        self.register_width() - self.width
    }
}

const fn low_mask(bits: u32) -> u32 {
    if bits >= u32::BITS {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

/// XOR one byte into the top of the working register and run the 8-step bit loop
const fn feed_byte(register: u32, byte: u8, params: &CrcParams) -> u32 {
    let width = params.register_width();
    let mask = low_mask(width);
    let poly = params.polynomial << params.register_shift();
    let top_bit = 1u32 << (width - 1);

    let mut crc = (register ^ ((byte as u32) << (width - 8))) & mask;
    let mut bit = 0;

    while bit < 8 {
        if (crc & top_bit) != 0 {
            crc = ((crc << 1) ^ poly) & mask;
        } else {
            crc = (crc << 1) & mask;
        }
        bit += 1;
    }

    crc
}

/// Precomputed 256-entry lookup table for one set of [`CrcParams`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrcTable {
    params: CrcParams,
    entries: [u32; 256],
}

impl CrcTable {
    pub const fn params(&self) -> CrcParams {
        self.params
    }

    pub fn entries(&self) -> &[u32; 256] {
        &self.entries
    }
}

impl Index<u8> for CrcTable {
    type Output = u32;

    fn index(&self, byte: u8) -> &u32 {
        &self.entries[byte as usize]
    }
}

/// Lookup table for the header CRC-4
pub static CRC4_TABLE: CrcTable = build_table(CrcParams::CRC4);

/// Lookup table for CRC-8
pub static CRC8_TABLE: CrcTable = build_table(CrcParams::CRC8);

/// Lookup table for the payload CRC-32
pub static CRC32_TABLE: CrcTable = build_table(CrcParams::CRC32);

/// Generate a CRC lookup table (usable at compile time)
///
/// Entry `i` is the CRC of the single byte `i`, so every entry equals
/// `compute_over_bytes(&[i], params)`.
pub const fn build_table(params: CrcParams) -> CrcTable {
    let mut entries = [0u32; 256];
    let shift = params.register_shift();
    let mut i = 0;

    while i < 256 {
        entries[i] = feed_byte(0, i as u8, &params) >> shift;
        i += 1;
    }

    CrcTable { params, entries }
}

/// Calculate a CRC bit by bit (bytes entry point)
///
/// # Arguments
///
/// * `data` - Bytes to checksum, processed first to last, MSB first
/// * `params` - CRC width and polynomial
///
/// # Returns
///
/// * `u32` - Checksum in the low `width` bits
///
/// # Examples
///
/// ```
/// use forcesensor_bridge::crc::engine::{compute_over_bytes, CrcParams};
///
/// assert_eq!(compute_over_bytes(b"123456789", CrcParams::CRC8), 0xF4);
/// ```
pub fn compute_over_bytes(data: &[u8], params: CrcParams) -> u32 {
    let crc = data
        .iter()
        .fold(0u32, |crc, &byte| feed_byte(crc, byte, &params));

    crc >> params.register_shift()
}

/// Calculate a CRC over an integer (integer entry point)
///
/// The value is first normalized with [`to_byte_list`]. Leading zero bits do
/// not change a zero-initialized CRC, so this equals the CRC of the value's
/// minimal big-endian representation.
pub fn compute_over_integer(value: u64, params: CrcParams) -> u32 {
    compute_over_bytes(&to_byte_list(value), params)
}

/// Calculate a CRC with a precomputed lookup table (fast)
///
/// Produces the same result as [`compute_over_bytes`] for the table's parameters.
pub fn compute_with_table(data: &[u8], table: &CrcTable) -> u32 {
    let params = table.params();
    let width = params.register_width();
    let shift = params.register_shift();
    let mask = low_mask(width);

    let mut crc: u32 = 0;

    for &byte in data {
        let index = ((crc >> (width - 8)) as u8) ^ byte;
        // Shifting out the byte used for the lookup; for 8-bit registers nothing remains
        let carried = if width > 8 { crc << 8 } else { 0 };
        crc = (carried ^ (table[index] << shift)) & mask;
    }

    crc >> shift
}

/// Split an integer into its minimal big-endian byte sequence
///
/// Zero is a single `0x00` byte; no other value gets a leading zero byte.
pub fn to_byte_list(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len() - 1);

    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK_INPUT: &[u8] = b"123456789";

    /// Deterministic byte sequences of assorted lengths
    fn sample_inputs() -> Vec<Vec<u8>> {
        let mut seed: u32 = 0x1234_5678;
        let mut inputs = vec![vec![0x00], vec![0xFF], vec![0xAA, 0x05], CHECK_INPUT.to_vec()];

        for len in [2usize, 3, 7, 16, 47, 100] {
            let data = (0..len)
                .map(|_| {
                    seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    (seed >> 16) as u8
                })
                .collect();
            inputs.push(data);
        }

        inputs
    }

    fn all_params() -> Vec<CrcParams> {
        vec![
            CrcParams::CRC4,
            CrcParams::CRC8,
            CrcParams::CRC32,
            CrcParams::new(4, 0x3).unwrap(),
            CrcParams::new(8, 0xD5).unwrap(),
            CrcParams::new(32, 0x1EDC_6F41).unwrap(),
        ]
    }

    #[test]
    fn test_crc32_known_vector() {
        // CRC-32/POSIX check value is 0x765E7680 with a final XOR of 0xFFFFFFFF
        assert_eq!(compute_over_bytes(CHECK_INPUT, CrcParams::CRC32), 0x765E_7680 ^ 0xFFFF_FFFF);
        assert_eq!(compute_with_table(CHECK_INPUT, &CRC32_TABLE), 0x89A1_897F);
    }

    #[test]
    fn test_crc8_known_vectors() {
        // CRC-8/SMBUS
        assert_eq!(compute_over_bytes(CHECK_INPUT, CrcParams::CRC8), 0xF4);
        // CRC-8/DVB-S2
        let dvb_s2 = CrcParams::new(8, 0xD5).unwrap();
        assert_eq!(compute_over_bytes(CHECK_INPUT, dvb_s2), 0xBC);
    }

    #[test]
    fn test_crc4_single_bytes() {
        assert_eq!(compute_over_bytes(&[0x00], CrcParams::CRC4), 0x0);
        assert_eq!(compute_over_bytes(&[0x01], CrcParams::CRC4), 0x9);
        assert_eq!(compute_over_bytes(&[0xFF], CrcParams::CRC4), 0x6);
        assert_eq!(compute_over_bytes(&[0x0A, 0xA5], CrcParams::CRC4), 0x9);
    }

    #[test]
    fn test_crc32_table_entries() {
        assert_eq!(CRC32_TABLE[0x00], 0x0000_0000);
        assert_eq!(CRC32_TABLE[0x01], 0x04C1_1DB7);
        assert_eq!(CRC32_TABLE[0x02], 0x0982_3B6E);
        assert_eq!(CRC32_TABLE[0xFF], 0xB1F7_40B4);
        assert_eq!(CRC8_TABLE[0xFF], 0xF3);
    }

    #[test]
    fn test_empty_input_is_zero() {
        for params in all_params() {
            assert_eq!(compute_over_bytes(&[], params), 0);
            assert_eq!(compute_with_table(&[], &build_table(params)), 0);
        }
    }

    #[test]
    fn test_table_entries_match_bitwise() {
        for params in all_params() {
            let table = build_table(params);
            for byte in 0..=255u8 {
                assert_eq!(
                    table[byte],
                    compute_over_bytes(&[byte], params),
                    "table mismatch for {:?} at byte 0x{:02X}",
                    params,
                    byte
                );
            }
        }
    }

    #[test]
    fn test_lookup_table_matches_bitwise() {
        for params in all_params() {
            let table = build_table(params);
            for data in sample_inputs() {
                assert_eq!(
                    compute_with_table(&data, &table),
                    compute_over_bytes(&data, params),
                    "CRC mismatch for {:?} over {:02X?}",
                    params,
                    data
                );
            }
        }
    }

    #[test]
    fn test_results_fit_width() {
        for params in all_params() {
            for data in sample_inputs() {
                assert_eq!(compute_over_bytes(&data, params) & !params.mask(), 0);
            }
        }
    }

    #[test]
    fn test_crc_changes_with_data() {
        let crc1 = compute_over_bytes(&[0x18, 0x16, 0x00, 0x04], CrcParams::CRC32);
        let crc2 = compute_over_bytes(&[0x18, 0x16, 0x00, 0x05], CrcParams::CRC32);
        assert_ne!(crc1, crc2, "CRC should change when data changes");
    }

    #[test]
    fn test_params_validation() {
        assert!(CrcParams::new(4, 0xF).is_ok());
        assert!(CrcParams::new(32, 0xFFFF_FFFF).is_ok());

        assert!(matches!(
            CrcParams::new(4, 0x13),
            Err(ForceSensorError::InvalidCrcParams(_))
        ));
        assert!(matches!(
            CrcParams::new(16, 0x8005),
            Err(ForceSensorError::InvalidCrcParams(_))
        ));
        assert!(CrcParams::new(8, 0x107).is_err());
    }

    #[test]
    fn test_to_byte_list() {
        assert_eq!(to_byte_list(0), vec![0x00]);
        assert_eq!(to_byte_list(0x7F), vec![0x7F]);
        assert_eq!(to_byte_list(0x100), vec![0x01, 0x00]);
        assert_eq!(to_byte_list(0xAA5), vec![0x0A, 0xA5]);
        assert_eq!(to_byte_list(u64::MAX), vec![0xFF; 8]);
    }

    #[test]
    fn test_integer_entry_point_matches_bytes() {
        assert_eq!(
            compute_over_integer(0x1234_5678, CrcParams::CRC32),
            compute_over_bytes(&[0x12, 0x34, 0x56, 0x78], CrcParams::CRC32)
        );
        // Leading zero bytes do not contribute
        assert_eq!(
            compute_over_integer(0xAA5, CrcParams::CRC4),
            compute_over_bytes(&[0x00, 0x0A, 0xA5], CrcParams::CRC4)
        );
    }
}
