//! # Sensor Frame Encoder
//!
//! Builds frames the way the sensor puts them on the wire. Used to feed
//! simulated devices and to produce known-good frames.

use bytes::{BufMut, BytesMut};

use super::protocol::*;
use crate::crc::engine::{compute_over_integer, compute_with_table, CrcParams, CRC32_TABLE};

/// Largest extension value (six status bits)
const MAX_DELAY_EXTENSION: u16 = 0x3F;

/// Largest delay the fields can carry, in ticks of 100 µs
const MAX_DELAY_TICKS: u16 = (MAX_DELAY_EXTENSION << 7) + 0xFF;

/// Encode the init marker and header byte for a sequence counter
///
/// # Examples
///
/// ```
/// use forcesensor_bridge::frame::encoder::encode_header;
///
/// assert_eq!(encode_header(5), [0xAA, 0x59]);
/// ```
pub fn encode_header(sequence_counter: u8) -> [u8; 2] {
    let mut header = FrameHeader {
        sequence_counter: sequence_counter & 0x0F,
        header_crc: 0,
    };
    header.header_crc = compute_over_integer(header.protected_value(), CrcParams::CRC4) as u8;

    [INIT_MARKER, header.to_byte()]
}

/// Append the little-endian CRC-32 trailer to a 47-byte payload
pub fn seal_payload(payload: &[u8]) -> Vec<u8> {
    let crc = compute_with_table(payload, &CRC32_TABLE);

    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.extend_from_slice(payload);
    frame.put_u32_le(crc);
    frame
}

/// Encode a packet into a 51-byte frame body
///
/// The packet's `checksum` field is ignored and recomputed. Channel values
/// are truncated to 24 bits and the delay saturates at the largest encodable value.
pub fn encode_packet(packet: &SensorPacket) -> Vec<u8> {
    let mut payload = BytesMut::with_capacity(PAYLOAD_LEN);

    for &value in packet.differential.iter().chain(packet.sum.iter()) {
        payload.put_int_le(i64::from(value), 3);
    }
    payload.put_u8(0); // reserved
    payload.put_u8(packet.report_id.code());
    payload.put_u8(packet.sequence_num);

    let ticks = (packet.delay / DELAY_UNIT_SECONDS)
        .round()
        .clamp(0.0, f64::from(MAX_DELAY_TICKS)) as u16;
    let extension = (ticks >> 7).min(MAX_DELAY_EXTENSION);
    payload.put_u8(((extension as u8) << 2) | packet.accuracy.code());
    payload.put_u8((ticks - (extension << 7)) as u8);

    for &axis in &packet.imu {
        payload.put_i16_le(axis);
    }

    seal_payload(&payload)
}

/// Encode a complete frame: header followed by the frame body
pub fn encode_frame(sequence_counter: u8, packet: &SensorPacket) -> Vec<u8> {
    let mut frame = encode_header(sequence_counter).to_vec();
    frame.extend_from_slice(&encode_packet(packet));
    frame
}
