//! # Wire Protocol Module
//!
//! Implementation of the drone's binary UDP protocol.
//!
//! This module handles:
//! - Outer-frame encoding and decoding (preamble + payload + CRC-16)
//! - CRC-8 / CRC-16 checksum calculation with the firmware's tables
//! - Stick-axes packing (four 11-bit axes + fast-mode bit)
//! - Flight data record decoding

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod records;
pub mod wire;

// Re-export commonly used types and functions
pub use wire::{
    decode_frame_size, encode_frame_size, msg, PacketTypeInfo, Preamble, FRAME_MAGIC,
    LOG_RECORD_MAGIC, MIN_FRAME_LEN, PREAMBLE_LEN, TYPE_INFO_COMMAND, TYPE_INFO_DATA,
    TYPE_INFO_STICK,
};

pub use encoder::{
    encode_clock_tail, encode_packet, encode_stick_axis, pack_stick_axes, STICK_AXIS_CENTER,
};

pub use decoder::{decode_frame, is_framed};

pub use records::{FlightData, FLIGHT_DATA_LEN};

pub use crc::{crc16, crc8};
