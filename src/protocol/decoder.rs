//! # Outer-Frame Decoder
//!
//! Splits an inbound datagram into its preamble and payload.

use super::crc::{crc16, crc8};
use super::wire::*;
use crate::error::{Result, TelloPilotError};

/// Decode a framed packet
///
/// Verifies the magic byte and slices the payload between the preamble and
/// the trailing CRC-16. CRC verification is optional: the drone's own
/// replies are accepted on the magic check alone for compatibility, and
/// `verify_crc` turns on strict checking of both checksums.
///
/// # Arguments
///
/// * `frame` - Complete datagram bytes
/// * `verify_crc` - Verify CRC-8 and CRC-16 before accepting the frame
///
/// # Returns
///
/// * `Result<(Preamble, &[u8])>` - Decoded preamble and payload slice
///
/// # Errors
///
/// Returns `Framing` if the frame is shorter than the minimum, the magic
/// byte is wrong, or (with `verify_crc`) a checksum does not match.
pub fn decode_frame(frame: &[u8], verify_crc: bool) -> Result<(Preamble, &[u8])> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(TelloPilotError::Framing(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    if frame[0] != FRAME_MAGIC {
        return Err(TelloPilotError::Framing(format!(
            "invalid magic byte: 0x{:02X}",
            frame[0]
        )));
    }

    if verify_crc {
        let expected_crc8 = crc8(&frame[0..3]);
        if frame[3] != expected_crc8 {
            return Err(TelloPilotError::Framing(format!(
                "preamble CRC-8 mismatch: expected 0x{:02X}, got 0x{:02X}",
                expected_crc8, frame[3]
            )));
        }

        let body = &frame[..frame.len() - 2];
        let stored = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        let expected_crc16 = crc16(body);
        if stored != expected_crc16 {
            return Err(TelloPilotError::Framing(format!(
                "frame CRC-16 mismatch: expected 0x{:04X}, got 0x{:04X}",
                expected_crc16, stored
            )));
        }
    }

    let preamble = Preamble {
        packet_size: decode_frame_size(frame[1], frame[2]),
        type_info: PacketTypeInfo::from_byte(frame[4]),
        message_id: u16::from_le_bytes([frame[5], frame[6]]),
        sequence_no: u16::from_le_bytes([frame[7], frame[8]]),
    };

    let payload = &frame[PREAMBLE_LEN..frame.len() - 2];

    Ok((preamble, payload))
}

/// Quick check whether a datagram looks like a framed packet
pub fn is_framed(datagram: &[u8]) -> bool {
    datagram.len() >= MIN_FRAME_LEN && datagram[0] == FRAME_MAGIC
}
