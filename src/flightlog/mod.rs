//! # Flight-Log Module
//!
//! Decoder for the obfuscated flight-log record stream the drone embeds in
//! its log-data message.
//!
//! This module handles:
//! - Walking the self-delimiting TLV record stream
//! - Per-record XOR deobfuscation
//! - Fixed-layout decodes for MVO, IMU, ImuEx and ultrasonic records
//! - Covariance matrix reconstruction from upper-triangle values

pub mod parser;
pub mod records;

pub use parser::{parse_log_payload, record_type, LogEntry};
pub use records::{
    AxisValidity, Imu, ImuExRecord, ImuRecord, LogRecordHeader, Mvo, MvoRecord, MvoValidity, Vo,
    VoValidity, IMU_EX_RECORD_LEN, IMU_RECORD_LEN, LOG_HEADER_LEN, MVO_RECORD_LEN,
};
