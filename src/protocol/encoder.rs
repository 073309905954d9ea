//! # Outer-Frame Encoder
//!
//! Builds complete framed packets and the stick-command payload.

use super::crc::{crc16, crc8};
use super::wire::*;

/// Centre value of an 11-bit stick axis
pub const STICK_AXIS_CENTER: u16 = 1024;

/// Half-range of an 11-bit stick axis
pub const STICK_AXIS_SCALE: f32 = 660.0;

/// Encode a complete framed packet
///
/// Computes the size field, the CRC-8 over the first three bytes, and the
/// trailing CRC-16 over everything before it.
///
/// # Arguments
///
/// * `type_info` - Packet type/direction byte (e.g. [`TYPE_INFO_COMMAND`])
/// * `message_id` - Message id
/// * `sequence_no` - Sequence number
/// * `payload` - Payload bytes (may be empty)
///
/// # Returns
///
/// * `Vec<u8>` - Complete frame, `9 + payload.len() + 2` bytes long
pub fn encode_packet(type_info: u8, message_id: u16, sequence_no: u16, payload: &[u8]) -> Vec<u8> {
    let total = PREAMBLE_LEN + payload.len() + 2;
    let mut frame = Vec::with_capacity(total);

    frame.push(FRAME_MAGIC);
    frame.extend_from_slice(&encode_frame_size(total as u16));
    frame.push(crc8(&frame[0..3]));
    frame.push(type_info);
    frame.extend_from_slice(&message_id.to_le_bytes());
    frame.extend_from_slice(&sequence_no.to_le_bytes());
    frame.extend_from_slice(payload);

    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());

    frame
}

/// Map a normalized stick value to its 11-bit wire encoding
///
/// Values are clamped to [-1.0, 1.0] and mapped as `1024 + round(660 · v)`,
/// giving the range [364, 1684].
pub fn encode_stick_axis(value: f32) -> u16 {
    let clamped = value.clamp(-1.0, 1.0);
    (STICK_AXIS_CENTER as i32 + (STICK_AXIS_SCALE * clamped).round() as i32) as u16
}

/// Pack the five stick axes into the 55-bit little-endian field
///
/// Axis order on the wire: roll, pitch, thrust, yaw, fast mode. Each axis
/// occupies an 11-bit slot packed LSB-first; the fast-mode slot carries a
/// single bit. The field occupies 7 bytes.
pub fn pack_stick_axes(roll: u16, pitch: u16, thrust: u16, yaw: u16, fast_mode: bool) -> [u8; 7] {
    let packed: u64 = (roll as u64 & 0x7FF)
        | (pitch as u64 & 0x7FF) << 11
        | (thrust as u64 & 0x7FF) << 22
        | (yaw as u64 & 0x7FF) << 33
        | (fast_mode as u64) << 44;

    let bytes = packed.to_le_bytes();
    [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
    ]
}

/// Encode the 7-byte wall-clock tail appended to every stick packet
///
/// Layout: hour, minute, second, then the millisecond low byte and high
/// byte, each written as a little-endian 16-bit word. The redundant word
/// encoding matches the drone firmware's expectation exactly.
pub fn encode_clock_tail(hour: u8, minute: u8, second: u8, millis: u16) -> [u8; 7] {
    let lo = (millis & 0xFF).to_le_bytes();
    let hi = (millis >> 8).to_le_bytes();

    [hour, minute, second, lo[0], lo[1], hi[0], hi[1]]
}
