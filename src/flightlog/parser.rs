//! # Flight-Log Parser
//!
//! Walks the concatenated, XOR-obfuscated record stream carried inside the
//! log-data message and dispatches each record by type.

use tracing::trace;

use super::records::*;
use crate::error::{Result, TelloPilotError};
use crate::protocol::wire::LOG_RECORD_MAGIC;

/// Record type ids appearing in the log stream
pub mod record_type {
    pub const ULTRASONIC: u16 = 0x0010;
    pub const MVO: u16 = 0x001D;
    pub const IMU: u16 = 0x0800;
    pub const IMU_EX: u16 = 0x0810;
}

/// Record types the firmware emits that the client recognizes but does not
/// interpret
const KNOWN_UNHANDLED: &[u16] = &[
    0x000C, // text / OSD
    0x03E8, // controller
    0x03E9, // aircraft condition
    0x03EA, // serial API inputs
    0x06AE, // battery info
    0x08A0, // atti mini
    0x2765, // ns data debug
    0x2766, // ns data component
    0x2774, // rec air comp
    0x04B0, // vertical control debug
    0x04B2, // vertical velocity control debug
    0x04B3, // vertical acceleration control debug
    0x0514, // horizontal control debug
    0x0517, 0x0518, 0x0519, 0x051A, 0x051B, // horizontal control family
];

/// One parsed entry from the log stream, still in the drone's native frame
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// Multiview visual odometry sample
    Mvo(Mvo),
    /// IMU sample
    Imu(Imu),
    /// Visual-inertial odometry sample
    Vo(Vo),
    /// Ultrasonic range, metres
    Proximity(f32),
    /// Recognized record type with no decoder
    Unhandled {
        record_type: u16,
        length: u16,
        payload: Vec<u8>,
    },
    /// Record type this client has never seen
    Unknown {
        record_type: u16,
        length: u16,
        payload: Vec<u8>,
    },
}

/// Parse the payload of a log-data message into its records
///
/// The first payload byte is a constant filler and is dropped. Records are
/// walked back to back; each record's payload is XORed with its per-record
/// key before decoding. Parsing never reads past `len - 2` (the stream's
/// trailing CRC-16 bytes).
///
/// # Errors
///
/// Returns `CorruptedLog` if a record header fails the magic check or a
/// record overruns the payload; the entire payload is discarded. Record
/// decode failures propagate as `ShortPayload`.
pub fn parse_log_payload(payload: &[u8]) -> Result<Vec<LogEntry>> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let data = &payload[1..];
    let len = data.len();
    let mut entries = Vec::new();
    let mut cursor = 0usize;

    while cursor < len.saturating_sub(2) {
        if data[cursor] != LOG_RECORD_MAGIC {
            return Err(TelloPilotError::CorruptedLog(format!(
                "bad record magic 0x{:02X} at offset {}",
                data[cursor], cursor
            )));
        }

        if len - cursor < LOG_HEADER_LEN {
            return Err(TelloPilotError::CorruptedLog(format!(
                "truncated record header at offset {}",
                cursor
            )));
        }

        let header = LogRecordHeader::decode(&data[cursor..])?;
        let record_length = header.record_length as usize;

        if record_length < LOG_HEADER_LEN + 2 {
            return Err(TelloPilotError::CorruptedLog(format!(
                "record length {} below header size at offset {}",
                record_length, cursor
            )));
        }
        if cursor + record_length > len {
            return Err(TelloPilotError::CorruptedLog(format!(
                "record of {} bytes overruns payload at offset {}",
                record_length, cursor
            )));
        }

        let mut body =
            data[cursor + LOG_HEADER_LEN..cursor + record_length - 2].to_vec();
        for byte in body.iter_mut() {
            *byte ^= header.xor_key;
        }

        entries.push(dispatch_record(&header, body)?);
        cursor += record_length;
    }

    Ok(entries)
}

fn dispatch_record(header: &LogRecordHeader, body: Vec<u8>) -> Result<LogEntry> {
    let entry = match header.record_type {
        record_type::MVO => {
            let record = MvoRecord::decode(&body)?;
            LogEntry::Mvo(Mvo::from(&record))
        }
        record_type::IMU => {
            let record = ImuRecord::decode(&body)?;
            LogEntry::Imu(Imu::from(&record))
        }
        record_type::IMU_EX => {
            let record = ImuExRecord::decode(&body)?;
            LogEntry::Vo(Vo::from(&record))
        }
        record_type::ULTRASONIC => {
            if body.len() < 2 {
                return Err(TelloPilotError::ShortPayload {
                    expected: 2,
                    actual: body.len(),
                });
            }
            let raw = u16::from_le_bytes([body[0], body[1]]);
            LogEntry::Proximity(raw as f32 / 1000.0)
        }
        t if KNOWN_UNHANDLED.contains(&t) => LogEntry::Unhandled {
            record_type: t,
            length: header.record_length,
            payload: body,
        },
        t => {
            trace!("unknown log record type 0x{:04X}", t);
            LogEntry::Unknown {
                record_type: t,
                length: header.record_length,
                payload: body,
            }
        }
    };

    Ok(entry)
}
