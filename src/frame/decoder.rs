//! # Sensor Packet Decoder
//!
//! Validates the CRC-32 trailer of a 51-byte frame body and decodes the
//! SH-2 payload into a [`SensorPacket`].

use bytes::Buf;

use super::protocol::*;
use crate::crc::engine::{compute_with_table, CRC32_TABLE};
use crate::error::{ChecksumKind, ForceSensorError, Result};

/// Verify the CRC-32 trailer of a frame body
///
/// The device sends the checksum least-significant byte first.
///
/// # Returns
///
/// * `Result<u32>` - The received checksum if it matches the payload
pub fn verify_checksum(frame: &[u8]) -> Result<u32> {
    if frame.len() != FRAME_LEN {
        return Err(ForceSensorError::IncompleteFrame {
            expected: FRAME_LEN,
            actual: frame.len(),
        });
    }

    let calculated = compute_with_table(&frame[..PAYLOAD_LEN], &CRC32_TABLE);
    let received = (&frame[CHECKSUM_OFFSET..]).get_u32_le();

    if calculated != received {
        return Err(ForceSensorError::ChecksumMismatch {
            kind: ChecksumKind::Payload,
            expected: calculated,
            actual: received,
        });
    }

    Ok(received)
}

/// Decode a complete frame body (the 51 bytes following the header)
///
/// # Arguments
///
/// * `frame` - Payload (47 bytes) followed by its little-endian CRC-32
/// * `sensor_num` - Which physical sensor the frame came from
///
/// # Errors
///
/// Returns error if:
/// - Frame is not exactly 51 bytes
/// - CRC-32 check fails
/// - Report ID is not a known code
pub fn decode_packet(frame: &[u8], sensor_num: u8) -> Result<SensorPacket> {
    let checksum = verify_checksum(frame)?;

    let report_id = ReportId::try_from(frame[REPORT_ID_OFFSET])?;
    let status = frame[STATUS_OFFSET];

    // Status bits 7..2 count in units of 128 ticks and add to the delay byte
    let delay_ticks = (u16::from(status >> 2) << 7) + u16::from(frame[DELAY_OFFSET]);

    let mut imu = &frame[IMU_OFFSET..CHECKSUM_OFFSET];

    Ok(SensorPacket {
        differential: read_channels(frame, DIFFERENTIAL_OFFSET),
        sum: read_channels(frame, SUM_OFFSET),
        report_id,
        sequence_num: frame[SEQUENCE_OFFSET],
        accuracy: Accuracy::from_status(status),
        delay: f64::from(delay_ticks) * DELAY_UNIT_SECONDS,
        imu: [imu.get_i16_le(), imu.get_i16_le(), imu.get_i16_le()],
        checksum,
        sensor_num,
    })
}

/// Six consecutive signed 24-bit little-endian values
fn read_channels(frame: &[u8], offset: usize) -> Channels {
    std::array::from_fn(|i| {
        let start = offset + i * 3;
        (&frame[start..start + 3]).get_int_le(3) as i32
    })
}
