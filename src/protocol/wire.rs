//! # Wire Protocol Constants and Types
//!
//! Outer-frame definitions for the drone's binary UDP protocol.
//!
//! Frame layout (little-endian):
//!
//! ```text
//! off size field
//!  0   1   magic = 0xCC
//!  1   2   size field (total frame length, stored shifted left by 3)
//!  3   1   crc8 over bytes 0..3
//!  4   1   packet type info bitfield
//!  5   2   message id
//!  7   2   sequence number
//!  9   N   payload
//! 9+N  2   crc16 over bytes 0..9+N
//! ```

/// Frame magic byte (always 0xCC)
pub const FRAME_MAGIC: u8 = 0xCC;

/// Flight-log record magic byte (always 0x55)
pub const LOG_RECORD_MAGIC: u8 = 0x55;

/// Preamble length: magic + size + crc8 + type info + message id + sequence
pub const PREAMBLE_LEN: usize = 9;

/// Minimum frame length: preamble plus trailing CRC-16
pub const MIN_FRAME_LEN: usize = PREAMBLE_LEN + 2;

/// Type-info byte for set-style commands (takeoff, land, calibrate, limits)
pub const TYPE_INFO_COMMAND: u8 = 0x68;

/// Type-info byte for data replies (time, log-header acknowledgement)
pub const TYPE_INFO_DATA: u8 = 0x50;

/// Type-info byte for the periodic stick packet
pub const TYPE_INFO_STICK: u8 = 0x60;

/// Message ids the client recognizes
pub mod msg {
    pub const CONNECT_CMD: u16 = 0x0001;
    pub const SSID_MSG: u16 = 0x0011;
    pub const SSID_CMD: u16 = 0x0012;
    pub const SSID_PASSWORD_MSG: u16 = 0x0013;
    pub const SSID_PASSWORD_CMD: u16 = 0x0014;
    pub const WIFI_REGION_MSG: u16 = 0x0015;
    pub const WIFI_REGION_CMD: u16 = 0x0016;
    pub const WIFI_STRENGTH_MSG: u16 = 0x001A;
    pub const LIGHT_MSG: u16 = 0x0035;
    pub const ERROR_1_MSG: u16 = 0x0043;
    pub const ERROR_2_MSG: u16 = 0x0044;
    pub const VERSION_MSG: u16 = 0x0045;
    pub const TIME_CMD: u16 = 0x0046;
    pub const STICK_CMD: u16 = 0x0050;
    pub const TAKEOFF_CMD: u16 = 0x0054;
    pub const LAND_CMD: u16 = 0x0055;
    pub const FLIGHT_MSG: u16 = 0x0056;
    pub const ALT_LIMIT_CMD: u16 = 0x0058;
    pub const FLIP_CMD: u16 = 0x005C;
    pub const THROW_AND_GO_CMD: u16 = 0x005D;
    pub const PALM_LAND_CMD: u16 = 0x005E;
    pub const SMART_VIDEO_CMD: u16 = 0x0080;
    pub const SMART_VIDEO_STATUS_MSG: u16 = 0x0081;
    pub const LOG_HEADER_MSG: u16 = 0x1050;
    pub const LOG_DATA_MSG: u16 = 0x1051;
    pub const LOG_CONFIG_MSG: u16 = 0x1052;
    pub const CALIBRATE_CMD: u16 = 0x1054;
    pub const LOW_BAT_THRESHOLD_CMD: u16 = 0x1055;
    pub const ALT_LIMIT_MSG: u16 = 0x1056;
    pub const LOW_BAT_THRESHOLD_MSG: u16 = 0x1057;
    pub const ATT_LIMIT_CMD: u16 = 0x1058;
    pub const ATT_LIMIT_MSG: u16 = 0x1059;
}

/// Packet type/direction bitfield
///
/// Bit layout, LSB first: `fromDrone:1 | toDrone:1 | packetType:3 | packetSubtype:3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketTypeInfo {
    pub from_drone: bool,
    pub to_drone: bool,
    pub packet_type: u8,
    pub packet_subtype: u8,
}

impl PacketTypeInfo {
    /// Unpack a type-info byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            from_drone: byte & 0x01 != 0,
            to_drone: byte & 0x02 != 0,
            packet_type: (byte >> 2) & 0x07,
            packet_subtype: (byte >> 5) & 0x07,
        }
    }

    /// Pack back into a single byte
    pub fn to_byte(self) -> u8 {
        (self.from_drone as u8)
            | (self.to_drone as u8) << 1
            | (self.packet_type & 0x07) << 2
            | (self.packet_subtype & 0x07) << 5
    }
}

/// Decoded outer-frame preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    /// Total frame length recovered from the size field
    pub packet_size: u16,

    /// Type/direction bitfield
    pub type_info: PacketTypeInfo,

    /// Message id (dispatch key)
    pub message_id: u16,

    /// Sequence number
    pub sequence_no: u16,
}

/// Encode a total frame length into the two size-field bytes
///
/// The length is stored shifted left by 3 within a little-endian 16-bit
/// field: `sizeL = (L << 3) & 0xFF`, `sizeH = (L >> 5) & 0xFF`.
pub fn encode_frame_size(len: u16) -> [u8; 2] {
    [((len << 3) & 0xFF) as u8, ((len >> 5) & 0xFF) as u8]
}

/// Recover a total frame length from the two size-field bytes
pub fn decode_frame_size(size_l: u8, size_h: u8) -> u16 {
    u16::from_le_bytes([size_l, size_h]) >> 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_constants() {
        assert_eq!(FRAME_MAGIC, 0xCC);
        assert_eq!(LOG_RECORD_MAGIC, 0x55);
        assert_eq!(PREAMBLE_LEN, 9);
        assert_eq!(MIN_FRAME_LEN, 11);
    }

    #[test]
    fn test_size_field_roundtrip() {
        for len in 11u16..=2048 {
            let [lo, hi] = encode_frame_size(len);
            assert_eq!(decode_frame_size(lo, hi), len, "length {}", len);
        }
    }

    #[test]
    fn test_size_field_known_value() {
        // An 11-byte frame encodes as 11 << 3 = 88 = 0x58
        assert_eq!(encode_frame_size(11), [0x58, 0x00]);
        // A 300-byte frame: 300 << 3 = 2400 = 0x0960
        assert_eq!(encode_frame_size(300), [0x60, 0x09]);
    }

    #[test]
    fn test_type_info_roundtrip() {
        for byte in 0u8..=255 {
            assert_eq!(PacketTypeInfo::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn test_type_info_command_bytes() {
        let cmd = PacketTypeInfo::from_byte(TYPE_INFO_COMMAND);
        assert!(!cmd.from_drone);
        assert!(!cmd.to_drone);
        assert_eq!(cmd.packet_type, 2);
        assert_eq!(cmd.packet_subtype, 3);

        let data = PacketTypeInfo::from_byte(TYPE_INFO_DATA);
        assert_eq!(data.packet_type, 4);
        assert_eq!(data.packet_subtype, 2);

        let stick = PacketTypeInfo::from_byte(TYPE_INFO_STICK);
        assert_eq!(stick.packet_type, 0);
        assert_eq!(stick.packet_subtype, 3);
    }
}
